//! Filters type-checked against a table's partition keys.

use metacat_core::{Field, FieldType, PartitionValues, ScalarValue};

use super::ast::{KeyKind, between, compare, lookup};
use super::{CompareOp, FilterError, FilterOptions, KeyValues, Literal, Predicate, parse};

/// A filter compiled for one table.
///
/// Holds both the parsed [`Predicate`] (for stores that accept pushdown)
/// and a typed form used for in-process evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionFilter {
    source: String,
    predicate: Predicate,
    typed: Typed,
    key_types: Vec<(String, FieldType)>,
}

#[derive(Debug, Clone, PartialEq)]
enum Typed {
    All,
    Compare {
        key: String,
        op: CompareOp,
        value: ScalarValue,
    },
    Between {
        key: String,
        low: ScalarValue,
        high: ScalarValue,
    },
    And(Box<Typed>, Box<Typed>),
    Or(Box<Typed>, Box<Typed>),
}

impl Typed {
    fn evaluate(&self, values: &KeyValues) -> bool {
        match self {
            Self::All => true,
            Self::And(a, b) => a.evaluate(values) && b.evaluate(values),
            Self::Or(a, b) => a.evaluate(values) || b.evaluate(values),
            Self::Compare { key, op, value } => {
                lookup(values, key).is_some_and(|actual| compare(actual, *op, value))
            }
            Self::Between { key, low, high } => {
                lookup(values, key).is_some_and(|actual| between(actual, low, high))
            }
        }
    }
}

impl PartitionFilter {
    /// Parses `text` and types it against `partition_fields`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Syntax`] for malformed text,
    /// [`FilterError::UnknownKey`] for keys that are not among
    /// `partition_fields`, and [`FilterError::TypeMismatch`] for literals
    /// that cannot be compared with their key's declared type.
    pub fn compile<'a>(
        text: &str,
        partition_fields: impl IntoIterator<Item = &'a Field>,
        options: &FilterOptions,
    ) -> Result<Self, FilterError> {
        let key_types: Vec<(String, FieldType)> = partition_fields
            .into_iter()
            .map(|f| (f.name.to_lowercase(), f.field_type.clone()))
            .collect();
        let predicate = parse(text, options)?;
        let typed = bind(&predicate, &key_types, options)?;
        Ok(Self {
            source: text.trim().to_string(),
            predicate,
            typed,
            key_types,
        })
    }

    /// Filter that matches every partition of a table.
    #[must_use]
    pub fn match_all<'a>(partition_fields: impl IntoIterator<Item = &'a Field>) -> Self {
        Self {
            source: String::new(),
            predicate: Predicate::All,
            typed: Typed::All,
            key_types: partition_fields
                .into_iter()
                .map(|f| (f.name.to_lowercase(), f.field_type.clone()))
                .collect(),
        }
    }

    /// Filter text as supplied.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed expression.
    #[must_use]
    pub const fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Returns true if the filter matches every partition.
    #[must_use]
    pub const fn is_match_all(&self) -> bool {
        self.predicate.is_all()
    }

    /// Decodes a partition name into typed key values.
    ///
    /// Values that do not parse as their key's declared type are kept as
    /// strings, so they never satisfy a numeric comparison. Returns `None`
    /// for malformed names.
    #[must_use]
    pub fn decode(&self, partition_name: &str) -> Option<KeyValues> {
        let values = PartitionValues::decode(partition_name).ok()?;
        Some(
            values
                .iter()
                .map(|(key, raw)| {
                    let key = key.to_lowercase();
                    let value = self
                        .key_type(&key)
                        .and_then(|ty| ScalarValue::parse_typed(&key, raw, ty).ok())
                        .unwrap_or_else(|| ScalarValue::String(raw.to_string()));
                    (key, value)
                })
                .collect(),
        )
    }

    /// Evaluates against decoded key values.
    #[must_use]
    pub fn matches(&self, values: &KeyValues) -> bool {
        self.typed.evaluate(values)
    }

    /// Decodes `partition_name` and evaluates against it.
    #[must_use]
    pub fn matches_name(&self, partition_name: &str) -> bool {
        if self.is_match_all() {
            return true;
        }
        match self.decode(partition_name) {
            Some(values) => self.matches(&values),
            None => {
                tracing::debug!(partition = %partition_name, "Skipping malformed partition name");
                false
            }
        }
    }

    fn key_type(&self, key: &str) -> Option<&FieldType> {
        self.key_types
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, ty)| ty)
    }
}

fn bind(
    predicate: &Predicate,
    key_types: &[(String, FieldType)],
    options: &FilterOptions,
) -> Result<Typed, FilterError> {
    Ok(match predicate {
        Predicate::All => Typed::All,
        Predicate::Compare { key, op, value } => {
            let (key, ty) = resolve(key, key_types)?;
            let value = convert(&key, ty, value, options)?;
            Typed::Compare { key, op: *op, value }
        }
        Predicate::Between { key, low, high } => {
            let (key, ty) = resolve(key, key_types)?;
            let low = convert(&key, ty, low, options)?;
            let high = convert(&key, ty, high, options)?;
            Typed::Between { key, low, high }
        }
        Predicate::And(a, b) => Typed::And(
            Box::new(bind(a, key_types, options)?),
            Box::new(bind(b, key_types, options)?),
        ),
        Predicate::Or(a, b) => Typed::Or(
            Box::new(bind(a, key_types, options)?),
            Box::new(bind(b, key_types, options)?),
        ),
    })
}

fn resolve<'a>(
    key: &str,
    key_types: &'a [(String, FieldType)],
) -> Result<(String, &'a FieldType), FilterError> {
    let lowered = key.to_lowercase();
    key_types
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(name, ty)| (name.clone(), ty))
        .ok_or_else(|| FilterError::UnknownKey(key.to_string()))
}

fn convert(
    key: &str,
    ty: &FieldType,
    literal: &Literal,
    options: &FilterOptions,
) -> Result<ScalarValue, FilterError> {
    literal
        .to_scalar(KeyKind::of_field(ty), options.type_policy)
        .ok_or_else(|| FilterError::TypeMismatch {
            key: key.to_string(),
            expected: ty.to_string(),
            found: literal.describe(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{BareWordPolicy, TypePolicy};

    fn fields() -> Vec<Field> {
        vec![
            Field::partition_key("pk1", FieldType::String, 0),
            Field::partition_key("pk2", FieldType::Int, 1),
            Field::partition_key("pk3", FieldType::Int, 2),
            Field::partition_key("ds", FieldType::Date, 3),
            Field::partition_key("live", FieldType::Boolean, 4),
        ]
    }

    fn compile(text: &str, options: &FilterOptions) -> Result<PartitionFilter, FilterError> {
        PartitionFilter::compile(text, &fields(), options)
    }

    const NAME: &str = "pk1=even/pk2=6/pk3=0/ds=2024-01-15/live=true";

    #[test]
    fn test_unknown_key_rejected() {
        assert_eq!(
            compile("pk9 = 1", &FilterOptions::default()).unwrap_err(),
            FilterError::UnknownKey("pk9".into())
        );
    }

    #[test]
    fn test_quoted_number_strict_vs_lenient() {
        let strict = compile(r#"pk2 = "6""#, &FilterOptions::strict()).unwrap_err();
        assert!(matches!(strict, FilterError::TypeMismatch { ref key, .. } if key == "pk2"));

        let lenient = compile(r#"pk2 = "6""#, &FilterOptions::default()).unwrap();
        assert!(lenient.matches_name(NAME));

        let garbage = compile(r#"pk2 = "six""#, &FilterOptions::default()).unwrap_err();
        assert!(matches!(garbage, FilterError::TypeMismatch { .. }));
    }

    #[test]
    fn test_typed_matching() {
        let options = FilterOptions::default();
        for (text, expected) in [
            (r#"pk1 = "even" AND pk3 = 0"#, true),
            ("pk2 between 5 and 8", true),
            ("pk2 > 6", false),
            (r#"ds >= "2024-01-01" AND ds < "2024-02-01""#, true),
            ("live = 1", true),
            (r#"live = "false""#, false),
            (r#"pk1 = "odd" OR pk2 = 6"#, true),
        ] {
            let filter = compile(text, &options).unwrap();
            assert_eq!(filter.matches_name(NAME), expected, "{text}");
        }
    }

    #[test]
    fn test_boolean_key_rejects_other_numbers() {
        assert!(matches!(
            compile("live = 2", &FilterOptions::default()),
            Err(FilterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_keys_resolved_case_insensitively() {
        let filter = compile("PK2 = 6", &FilterOptions::default()).unwrap();
        assert!(filter.matches_name(NAME));
    }

    #[test]
    fn test_untyped_value_never_matches_numeric_literal() {
        let filter = compile("pk2 = 6", &FilterOptions::default()).unwrap();
        assert!(!filter.matches_name("pk1=even/pk2=abc/pk3=0"));
    }

    #[test]
    fn test_malformed_name_does_not_match() {
        let filter = compile("pk2 = 6", &FilterOptions::default()).unwrap();
        assert!(!filter.matches_name("not-a-partition"));
    }

    #[test]
    fn test_match_all() {
        let filter = PartitionFilter::match_all(&fields());
        assert!(filter.is_match_all());
        assert!(filter.matches_name("anything"));
        let empty = compile("  ", &FilterOptions::default()).unwrap();
        assert!(empty.is_match_all());
    }

    #[test]
    fn test_bare_words_follow_policy() {
        assert!(matches!(
            compile("pk1=even", &FilterOptions::default()),
            Err(FilterError::Syntax { .. })
        ));
        let options = FilterOptions {
            bare_words: BareWordPolicy::AsString,
            type_policy: TypePolicy::Lenient,
        };
        let filter = compile("pk1=even", &options).unwrap();
        assert!(filter.matches_name(NAME));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn between_agrees_with_bounds(v in -50i64..50, lo in -50i64..50, hi in -50i64..50) {
                let fields = vec![Field::partition_key("n", FieldType::BigInt, 0)];
                let filter = PartitionFilter::compile(
                    &format!("n BETWEEN {lo} AND {hi}"),
                    &fields,
                    &FilterOptions::default(),
                ).unwrap();
                let name = format!("n={v}");
                prop_assert_eq!(filter.matches_name(&name), lo <= v && v <= hi);
            }

            #[test]
            fn mirrored_comparison_is_equivalent(v in -20i64..20, lit in -20i64..20) {
                let fields = vec![Field::partition_key("n", FieldType::Int, 0)];
                let options = FilterOptions::default();
                let name = format!("n={v}");
                for (left, right) in [("<", ">"), ("<=", ">="), ("=", "="), ("<>", "<>")] {
                    let a = PartitionFilter::compile(&format!("n {left} {lit}"), &fields, &options).unwrap();
                    let b = PartitionFilter::compile(&format!("{lit} {right} n"), &fields, &options).unwrap();
                    prop_assert_eq!(a.matches_name(&name), b.matches_name(&name));
                }
            }
        }
    }
}

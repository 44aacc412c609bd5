//! Filter syntax tree and untyped evaluation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use metacat_core::{FieldType, ScalarValue};

use super::TypePolicy;

/// Decoded partition-key values of one partition, keyed by key name.
pub type KeyValues = BTreeMap<String, ScalarValue>;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=` or `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Operator with the operands swapped: `a < b` is `b > a`.
    #[must_use]
    pub const fn mirror(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    /// Returns true if `ordering` (of key relative to literal) satisfies
    /// the operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Ne => !matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Le => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Ge => !matches!(ordering, Ordering::Less),
        }
    }

    /// SQL spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Literal as written in the filter, before typing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Unquoted number, kept as source text.
    Number(String),
    /// Double-quoted string.
    String(String),
}

impl Literal {
    /// Source text without quotes.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Number(s) | Self::String(s) => s,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Number(s) => format!("number {s}"),
            Self::String(s) => format!("string literal \"{s}\""),
        }
    }

    /// Converts the literal to a value comparable with keys of `kind`.
    pub(crate) fn to_scalar(&self, kind: KeyKind, policy: TypePolicy) -> Option<ScalarValue> {
        match (kind, self) {
            (KeyKind::Numeric, Self::Number(text)) => parse_number(text),
            (KeyKind::Numeric, Self::String(text)) => match policy {
                TypePolicy::Strict => None,
                TypePolicy::Lenient => parse_number(text.trim()),
            },
            (KeyKind::Boolean, Self::Number(text)) => match text.as_str() {
                "1" => Some(ScalarValue::Boolean(true)),
                "0" => Some(ScalarValue::Boolean(false)),
                _ => None,
            },
            (KeyKind::Boolean, Self::String(text)) => {
                match text.trim().to_ascii_lowercase().as_str() {
                    "true" => Some(ScalarValue::Boolean(true)),
                    "false" => Some(ScalarValue::Boolean(false)),
                    _ => None,
                }
            }
            (KeyKind::Text, literal) => Some(ScalarValue::String(literal.text().to_string())),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(s) => f.write_str(s),
            Self::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    if matches!(c, '"' | '\\') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")
            }
        }
    }
}

fn parse_number(text: &str) -> Option<ScalarValue> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(ScalarValue::Int64(n));
    }
    text.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(ScalarValue::Float64)
}

/// How literals compared against a key are typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyKind {
    Numeric,
    Boolean,
    Text,
}

impl KeyKind {
    pub(crate) const fn of_field(field_type: &FieldType) -> Self {
        if field_type.is_numeric() {
            Self::Numeric
        } else if matches!(field_type, FieldType::Boolean) {
            Self::Boolean
        } else {
            Self::Text
        }
    }

    const fn of_value(value: &ScalarValue) -> Self {
        match value {
            ScalarValue::Int64(_) | ScalarValue::Float64(_) => Self::Numeric,
            ScalarValue::Boolean(_) => Self::Boolean,
            ScalarValue::String(_) | ScalarValue::Date(_) | ScalarValue::Timestamp(_) => {
                Self::Text
            }
        }
    }
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// Matches every partition (empty filter).
    All,
    /// `key op literal`.
    Compare {
        /// Partition key.
        key: String,
        /// Operator, with the key on the left.
        op: CompareOp,
        /// Right-hand literal.
        value: Literal,
    },
    /// `key BETWEEN low AND high`, inclusive.
    Between {
        /// Partition key.
        key: String,
        /// Lower bound.
        low: Literal,
        /// Upper bound.
        high: Literal,
    },
    /// Conjunction.
    And(Box<Predicate>, Box<Predicate>),
    /// Disjunction.
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Returns true for the match-everything predicate.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Partition keys referenced anywhere in the expression.
    #[must_use]
    pub fn keys(&self) -> BTreeSet<&str> {
        let mut keys = BTreeSet::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, keys: &mut BTreeSet<&'a str>) {
        match self {
            Self::All => {}
            Self::Compare { key, .. } | Self::Between { key, .. } => {
                keys.insert(key);
            }
            Self::And(a, b) | Self::Or(a, b) => {
                a.collect_keys(keys);
                b.collect_keys(keys);
            }
        }
    }

    /// Evaluates the predicate against one partition's key values.
    ///
    /// Literals are typed by the runtime kind of the value they are
    /// compared with, leniently. A comparison on a missing key, or one whose
    /// literal cannot be converted, is false. Use
    /// [`PartitionFilter`](super::PartitionFilter) to type-check against
    /// declared key types up front.
    #[must_use]
    pub fn evaluate(&self, values: &KeyValues) -> bool {
        match self {
            Self::All => true,
            Self::And(a, b) => a.evaluate(values) && b.evaluate(values),
            Self::Or(a, b) => a.evaluate(values) || b.evaluate(values),
            Self::Compare { key, op, value } => lookup(values, key).is_some_and(|actual| {
                value
                    .to_scalar(KeyKind::of_value(actual), TypePolicy::Lenient)
                    .is_some_and(|literal| compare(actual, *op, &literal))
            }),
            Self::Between { key, low, high } => lookup(values, key).is_some_and(|actual| {
                let kind = KeyKind::of_value(actual);
                match (
                    low.to_scalar(kind, TypePolicy::Lenient),
                    high.to_scalar(kind, TypePolicy::Lenient),
                ) {
                    (Some(low), Some(high)) => between(actual, &low, &high),
                    _ => false,
                }
            }),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => Ok(()),
            Self::Compare { key, op, value } => write!(f, "{key} {op} {value}"),
            Self::Between { key, low, high } => write!(f, "{key} BETWEEN {low} AND {high}"),
            Self::And(a, b) => write!(f, "({a} AND {b})"),
            Self::Or(a, b) => write!(f, "({a} OR {b})"),
        }
    }
}

pub(crate) fn lookup<'a>(values: &'a KeyValues, key: &str) -> Option<&'a ScalarValue> {
    values.get(key).or_else(|| {
        values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

pub(crate) fn compare(actual: &ScalarValue, op: CompareOp, literal: &ScalarValue) -> bool {
    actual
        .compare(literal)
        .is_some_and(|ordering| op.accepts(ordering))
}

pub(crate) fn between(actual: &ScalarValue, low: &ScalarValue, high: &ScalarValue) -> bool {
    compare(actual, CompareOp::Ge, low) && compare(actual, CompareOp::Le, high)
}

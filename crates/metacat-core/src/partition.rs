//! Partition names and typed partition-key values.
//!
//! A partition name is the `/`-joined sequence of `key=value` pairs, keys in
//! the table's partition-key declaration order:
//!
//! ```text
//! GRAMMAR:
//!   PARTITION_NAME ::= segment ("/" segment)*
//!   segment        ::= escaped_key "=" escaped_value
//!
//!   escaped_*      ::= the raw text with each reserved byte replaced by
//!                      "%" HEX HEX (upper-case)
//!   reserved       ::= 0x01-0x1F | '"' | '#' | '%' | '\'' | '*' | '/' | ':'
//!                    | '=' | '?' | '\\' | 0x7F | '{' | '[' | ']' | '^'
//! ```
//!
//! The reserved set matches the escaping used by Hive-compatible metastores,
//! so names produced here line up with the directory names those backends
//! write. Decoding inverts encoding for every tuple:
//! `PartitionValues::decode(&v.encode()) == Ok(v)`.
//!
//! # Examples
//!
//! ```rust
//! use metacat_core::partition::PartitionValues;
//!
//! let mut values = PartitionValues::new();
//! values.push("dateint", "20240101");
//! values.push("path", "a/b=c");
//!
//! let name = values.encode();
//! assert_eq!(name, "dateint=20240101/path=a%2Fb%3Dc");
//! assert_eq!(PartitionValues::decode(&name).unwrap(), values);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::field::FieldType;

/// Partition value that stands for SQL `NULL`. Never a legal stored value.
pub const NULL_PARTITION_VALUE: &str = "null";

/// Typed partition-key value, decoded from a partition name with the
/// declared type of its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarValue {
    /// Any integral key type.
    Int64(i64),
    /// Floating-point and decimal key types.
    Float64(f64),
    /// Boolean key.
    Boolean(bool),
    /// Character key types (compared byte-wise).
    String(String),
    /// Date in YYYY-MM-DD format.
    Date(String),
    /// Timestamp in ISO 8601 format.
    Timestamp(String),
}

impl ScalarValue {
    /// Decodes a raw partition value using the declared key type.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionNameError::InvalidValue`] if the text does not
    /// parse as the declared type.
    pub fn parse_typed(
        key: &str,
        raw: &str,
        field_type: &FieldType,
    ) -> Result<Self, PartitionNameError> {
        let invalid = || PartitionNameError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected: field_type.to_string(),
        };

        match field_type {
            FieldType::TinyInt | FieldType::SmallInt | FieldType::Int | FieldType::BigInt => {
                raw.trim().parse().map(Self::Int64).map_err(|_| invalid())
            }
            FieldType::Float | FieldType::Double | FieldType::Decimal => {
                let n: f64 = raw.trim().parse().map_err(|_| invalid())?;
                if n.is_finite() {
                    Ok(Self::Float64(n))
                } else {
                    Err(invalid())
                }
            }
            FieldType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Self::Boolean(true)),
                "false" => Ok(Self::Boolean(false)),
                _ => Err(invalid()),
            },
            FieldType::Date => {
                if is_valid_date_format(raw) {
                    Ok(Self::Date(raw.to_string()))
                } else {
                    Err(invalid())
                }
            }
            FieldType::Timestamp => Ok(Self::Timestamp(raw.to_string())),
            FieldType::String
            | FieldType::Char
            | FieldType::Varchar
            | FieldType::Binary
            | FieldType::Other(_) => Ok(Self::String(raw.to_string())),
        }
    }

    /// Returns true for the numeric variants.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int64(_) | Self::Float64(_))
    }

    /// Orders two values of compatible kinds.
    ///
    /// Integers and floats compare numerically (total order); the textual
    /// variants compare byte-wise with each other. Returns `None` for
    /// incompatible kinds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int64(a), Self::Int64(b)) => Some(a.cmp(b)),
            (Self::Int64(a), Self::Float64(b)) => Some((*a as f64).total_cmp(b)),
            (Self::Float64(a), Self::Int64(b)) => Some(a.total_cmp(&(*b as f64))),
            (Self::Float64(a), Self::Float64(b)) => Some(a.total_cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_text(), b.as_text()) {
                (Some(a), Some(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
                _ => None,
            },
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Date(s) | Self::Timestamp(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(n) => write!(f, "{n}"),
            Self::Float64(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) | Self::Date(s) | Self::Timestamp(s) => f.write_str(s),
        }
    }
}

/// Ordered `key=value` tuple behind a partition name.
///
/// Order is significant: it is the declaration order of the table's
/// partition-key fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PartitionValues(Vec<(String, String)>);

impl PartitionValues {
    /// Creates an empty tuple.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `key=value` pair.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Returns the raw value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Returns an iterator over `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes the tuple as a partition name.
    #[must_use]
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", escape_path_name(k), escape_path_name(v)))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Decodes a partition name into its ordered tuple.
    ///
    /// This is the inverse of [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, a segment lacks `=`, a key is
    /// empty, or an escape sequence decodes to invalid UTF-8.
    pub fn decode(name: &str) -> Result<Self, PartitionNameError> {
        if name.is_empty() {
            return Err(PartitionNameError::Empty);
        }

        let mut values = Self::new();
        for segment in name.split('/') {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| PartitionNameError::MissingEquals(segment.to_string()))?;
            if key.is_empty() {
                return Err(PartitionNameError::EmptyKey(segment.to_string()));
            }
            values.push(unescape_path_name(key)?, unescape_path_name(value)?);
        }
        Ok(values)
    }

    /// Checks the tuple against a table's declared partition keys.
    ///
    /// Keys must match the declaration exactly and in order (compared
    /// case-insensitively), and every value must be non-empty and not the
    /// [`NULL_PARTITION_VALUE`] placeholder.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self, partition_keys: &[&str]) -> Result<(), PartitionNameError> {
        let keys_match = self.len() == partition_keys.len()
            && self
                .keys()
                .zip(partition_keys)
                .all(|(actual, expected)| actual.eq_ignore_ascii_case(expected));
        if !keys_match {
            return Err(PartitionNameError::KeyMismatch {
                expected: partition_keys.iter().map(ToString::to_string).collect(),
                found: self.keys().map(ToString::to_string).collect(),
            });
        }

        for (key, value) in self.iter() {
            if value.trim().is_empty() {
                return Err(PartitionNameError::EmptyValue(key.to_string()));
            }
            if value.eq_ignore_ascii_case(NULL_PARTITION_VALUE) {
                return Err(PartitionNameError::NullValue(key.to_string()));
            }
        }
        Ok(())
    }

    /// Validates the tuple and respells its keys as declared.
    ///
    /// Two names that differ only in key case, or in how their values are
    /// escaped, canonicalize to the same encoded name.
    ///
    /// # Errors
    ///
    /// Returns the first violation found by [`validate`](Self::validate).
    pub fn canonicalize(self, partition_keys: &[&str]) -> Result<Self, PartitionNameError> {
        self.validate(partition_keys)?;
        Ok(Self(
            partition_keys
                .iter()
                .zip(self.0)
                .map(|(declared, (_, value))| ((*declared).to_string(), value))
                .collect(),
        ))
    }
}

impl fmt::Display for PartitionValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PartitionValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

const fn needs_escape(b: u8) -> bool {
    matches!(
        b,
        0x01..=0x1F
            | b'"'
            | b'#'
            | b'%'
            | b'\''
            | b'*'
            | b'/'
            | b':'
            | b'='
            | b'?'
            | b'\\'
            | 0x7F
            | b'{'
            | b'['
            | b']'
            | b'^'
    )
}

/// Escapes reserved bytes as `%XX`.
#[must_use]
pub fn escape_path_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() && needs_escape(c as u8) {
            out.push_str(&format!("%{:02X}", c as u8));
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverses [`escape_path_name`].
///
/// A `%` not followed by two hex digits is kept literally.
///
/// # Errors
///
/// Returns [`PartitionNameError::InvalidUtf8`] if the unescaped bytes are not
/// valid UTF-8.
pub fn unescape_path_name(escaped: &str) -> Result<String, PartitionNameError> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(decoded) = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(decoded);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).map_err(|_| PartitionNameError::InvalidUtf8(escaped.to_string()))
}

/// Validates date format (YYYY-MM-DD).
fn is_valid_date_format(s: &str) -> bool {
    if s.len() != 10 {
        return false;
    }
    let bytes = s.as_bytes();
    bytes.get(4) == Some(&b'-')
        && bytes.get(7) == Some(&b'-')
        && s.get(..4).is_some_and(|y| y.parse::<u16>().is_ok())
        && s.get(5..7).is_some_and(|m| m.parse::<u8>().is_ok())
        && s.get(8..).is_some_and(|d| d.parse::<u8>().is_ok())
}

/// Errors that can occur when decoding or validating a partition name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionNameError {
    /// The partition name is empty.
    Empty,
    /// Missing '=' separator between key and value.
    MissingEquals(String),
    /// A segment has an empty key.
    EmptyKey(String),
    /// Unescaped bytes are not UTF-8.
    InvalidUtf8(String),
    /// Keys differ from the table's declared partition keys.
    KeyMismatch {
        /// Declared partition keys.
        expected: Vec<String>,
        /// Keys present in the name.
        found: Vec<String>,
    },
    /// A partition key has an empty value.
    EmptyValue(String),
    /// A partition key has the null placeholder as its value.
    NullValue(String),
    /// A value does not parse as its key's declared type.
    InvalidValue {
        /// Partition key.
        key: String,
        /// Raw value.
        value: String,
        /// Declared type.
        expected: String,
    },
}

impl fmt::Display for PartitionNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "partition name is empty"),
            Self::MissingEquals(s) => write!(f, "missing '=' in partition segment: {s}"),
            Self::EmptyKey(s) => write!(f, "empty partition key in segment: {s}"),
            Self::InvalidUtf8(s) => write!(f, "invalid UTF-8 after unescaping: {s}"),
            Self::KeyMismatch { expected, found } => write!(
                f,
                "partition keys [{}] do not match declared keys [{}]",
                found.join(", "),
                expected.join(", ")
            ),
            Self::EmptyValue(k) => write!(f, "partition key '{k}' has an empty value"),
            Self::NullValue(k) => write!(f, "partition key '{k}' has a null value"),
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "value '{value}' of partition key '{key}' is not a valid {expected}"),
        }
    }
}

impl std::error::Error for PartitionNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> PartitionValues {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_encode_preserves_declaration_order() {
        let v = values(&[("pk2", "1"), ("pk1", "even")]);
        assert_eq!(v.encode(), "pk2=1/pk1=even");
    }

    #[test]
    fn test_encode_escapes_reserved_characters() {
        let v = values(&[("path", "foo/bar?baz=1%x:y")]);
        assert_eq!(v.encode(), "path=foo%2Fbar%3Fbaz%3D1%25x%3Ay");
    }

    #[test]
    fn test_decode_roundtrip_with_reserved_and_unicode() {
        let v = values(&[("region", "us/east=1"), ("label", "héllo#%2F"), ("k=1", "v")]);
        let decoded = PartitionValues::decode(&v.encode()).expect("should decode");
        assert_eq!(decoded, v);
    }

    #[test]
    fn test_decode_keeps_stray_percent() {
        let v = PartitionValues::decode("a=100%").unwrap();
        assert_eq!(v.get("a"), Some("100%"));
        let v = PartitionValues::decode("a=%zz").unwrap();
        assert_eq!(v.get("a"), Some("%zz"));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(PartitionValues::decode(""), Err(PartitionNameError::Empty));
        assert!(matches!(
            PartitionValues::decode("noequals"),
            Err(PartitionNameError::MissingEquals(_))
        ));
        assert!(matches!(
            PartitionValues::decode("a=1/=2"),
            Err(PartitionNameError::EmptyKey(_))
        ));
        assert!(matches!(
            PartitionValues::decode("a=%FF"),
            Err(PartitionNameError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_validate_accepts_declared_keys() {
        let v = values(&[("dateint", "20240101"), ("hour", "3")]);
        assert!(v.validate(&["dateint", "hour"]).is_ok());
        assert!(v.validate(&["DATEINT", "hour"]).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_keys() {
        let v = values(&[("hour", "3"), ("dateint", "20240101")]);
        assert!(matches!(
            v.validate(&["dateint", "hour"]),
            Err(PartitionNameError::KeyMismatch { .. })
        ));
        let v = values(&[("dateint", "20240101")]);
        assert!(matches!(
            v.validate(&["dateint", "hour"]),
            Err(PartitionNameError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_canonicalize_uses_declared_key_spelling() {
        let upper = PartitionValues::decode("DATEINT=20240101/Hour=3").unwrap();
        let canonical = upper.canonicalize(&["dateint", "hour"]).unwrap();
        assert_eq!(canonical.encode(), "dateint=20240101/hour=3");

        let escaped = PartitionValues::decode("dateint=a%2fb").unwrap();
        assert_eq!(
            escaped.canonicalize(&["dateint"]).unwrap().encode(),
            "dateint=a%2Fb"
        );

        let wrong = PartitionValues::decode("hour=3").unwrap();
        assert!(matches!(
            wrong.canonicalize(&["dateint"]),
            Err(PartitionNameError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_and_null_values() {
        let v = values(&[("dateint", "")]);
        assert_eq!(
            v.validate(&["dateint"]),
            Err(PartitionNameError::EmptyValue("dateint".into()))
        );
        let v = values(&[("dateint", "NULL")]);
        assert_eq!(
            v.validate(&["dateint"]),
            Err(PartitionNameError::NullValue("dateint".into()))
        );
    }

    #[test]
    fn test_parse_typed() {
        assert_eq!(
            ScalarValue::parse_typed("k", "42", &FieldType::BigInt).unwrap(),
            ScalarValue::Int64(42)
        );
        assert_eq!(
            ScalarValue::parse_typed("k", "1.5", &FieldType::Decimal).unwrap(),
            ScalarValue::Float64(1.5)
        );
        assert_eq!(
            ScalarValue::parse_typed("k", "TRUE", &FieldType::Boolean).unwrap(),
            ScalarValue::Boolean(true)
        );
        assert_eq!(
            ScalarValue::parse_typed("k", "2024-01-15", &FieldType::Date).unwrap(),
            ScalarValue::Date("2024-01-15".into())
        );
        assert!(ScalarValue::parse_typed("k", "abc", &FieldType::Int).is_err());
        assert!(ScalarValue::parse_typed("k", "2024/01/15", &FieldType::Date).is_err());
    }

    #[test]
    fn test_compare_mixed_numeric_and_text() {
        use std::cmp::Ordering;
        assert_eq!(
            ScalarValue::Int64(2).compare(&ScalarValue::Float64(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            ScalarValue::String("b".into()).compare(&ScalarValue::String("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(
            ScalarValue::Date("2024-01-02".into()).compare(&ScalarValue::String("2024-01-10".into())),
            Some(Ordering::Less)
        );
        assert_eq!(
            ScalarValue::Int64(1).compare(&ScalarValue::String("1".into())),
            None
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_inverts_encode(
                pairs in prop::collection::vec(
                    ("[a-z_][a-z0-9_=/%:]{0,8}", "\\PC{0,12}"),
                    1..5
                )
            ) {
                let v: PartitionValues = pairs.into_iter().collect();
                let decoded = PartitionValues::decode(&v.encode())
                    .unwrap_or_else(|e| panic!("failed to decode {}: {e}", v.encode()));
                prop_assert_eq!(decoded, v);
            }
        }
    }
}

//! Table fields and their scalar types.
//!
//! Field types are a small fixed set: enough to type partition-key
//! comparisons, not a full SQL type system. Anything else is carried
//! through as [`FieldType::Other`] with its source spelling.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Scalar type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `boolean`
    Boolean,
    /// `tinyint`
    TinyInt,
    /// `smallint`
    SmallInt,
    /// `int` / `integer`
    Int,
    /// `bigint` / `long`
    BigInt,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `decimal`, with or without precision.
    Decimal,
    /// `string`
    String,
    /// `char(n)`
    Char,
    /// `varchar(n)`
    Varchar,
    /// `date`
    Date,
    /// `timestamp`
    Timestamp,
    /// `binary`
    Binary,
    /// Any other type, kept verbatim.
    Other(String),
}

impl FieldType {
    /// Returns true for integral, floating and decimal types.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::TinyInt
                | Self::SmallInt
                | Self::Int
                | Self::BigInt
                | Self::Float
                | Self::Double
                | Self::Decimal
        )
    }

    /// Returns true for integral types.
    #[must_use]
    pub const fn is_integral(&self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt
        )
    }

    /// Returns true for types compared as text.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::String
                | Self::Char
                | Self::Varchar
                | Self::Date
                | Self::Timestamp
                | Self::Binary
                | Self::Other(_)
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Boolean => "boolean",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Char => "char",
            Self::Varchar => "varchar",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Binary => "binary",
            Self::Other(raw) => raw,
        };
        f.write_str(s)
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::invalid_schema("field type cannot be empty"));
        }
        // Strip parameters: decimal(10,2), varchar(255), char(1)
        let base = raw
            .split_once('(')
            .map_or(raw, |(base, _)| base)
            .trim()
            .to_ascii_lowercase();
        Ok(match base.as_str() {
            "boolean" | "bool" => Self::Boolean,
            "tinyint" => Self::TinyInt,
            "smallint" => Self::SmallInt,
            "int" | "integer" => Self::Int,
            "bigint" | "long" => Self::BigInt,
            "float" | "real" => Self::Float,
            "double" => Self::Double,
            "decimal" | "numeric" => Self::Decimal,
            "string" => Self::String,
            "char" => Self::Char,
            "varchar" => Self::Varchar,
            "date" => Self::Date,
            "timestamp" => Self::Timestamp,
            "binary" => Self::Binary,
            _ => Self::Other(raw.to_string()),
        })
    }
}

impl Serialize for FieldType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Column type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Zero-based position in the field sequence.
    pub position: u32,
    /// Whether the column is a partition key.
    #[serde(default)]
    pub is_partition_key: bool,
    /// Free-form column comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Field {
    /// Creates a regular (non-partition) field.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType, position: u32) -> Self {
        Self {
            name: name.into(),
            field_type,
            position,
            is_partition_key: false,
            comment: None,
        }
    }

    /// Creates a partition-key field.
    #[must_use]
    pub fn partition_key(name: impl Into<String>, field_type: FieldType, position: u32) -> Self {
        Self {
            is_partition_key: true,
            ..Self::new(name, field_type, position)
        }
    }

    /// Sets the comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Checks a field list for empty and duplicate names.
///
/// # Errors
///
/// Returns [`Error::InvalidSchema`] on the first violation.
pub fn validate_fields(fields: &[Field]) -> Result<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        let name = field.name.trim();
        if name.is_empty() {
            return Err(Error::invalid_schema("field name cannot be empty"));
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(Error::invalid_schema(format!(
                "duplicate field name '{name}'"
            )));
        }
    }
    Ok(())
}

/// Moves partition-key fields after all regular fields and renumbers
/// positions.
///
/// Relative order within each group is preserved. Some backends store
/// partition keys as trailing columns and require this layout.
#[must_use]
pub fn relocate_partition_keys(fields: Vec<Field>) -> Vec<Field> {
    let (mut regular, keys): (Vec<_>, Vec<_>) =
        fields.into_iter().partition(|f| !f.is_partition_key);
    regular.extend(keys);
    renumber(regular)
}

fn renumber(fields: Vec<Field>) -> Vec<Field> {
    fields
        .into_iter()
        .zip(0u32..)
        .map(|(mut field, position)| {
            field.position = position;
            field
        })
        .collect()
}

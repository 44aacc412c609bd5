//! Hierarchical qualified names.
//!
//! Every catalog entity is addressed by a [`QualifiedName`]:
//!
//! ```text
//! catalog
//! catalog/database
//! catalog/database/table
//! catalog/database/table/key1=value1/key2=value2
//! ```
//!
//! The string form is split at most four ways, so the partition segment keeps
//! its own `/` separators. Catalog, database, and table segments are trimmed
//! and lower-cased; the partition segment is only trimmed because partition
//! values are case-sensitive.
//!
//! # Example
//!
//! ```rust
//! use metacat_core::name::{NameType, QualifiedName};
//!
//! let name: QualifiedName = "prodhive/events/clicks/dateint=20240101/hour=3".parse().unwrap();
//! assert_eq!(name.name_type(), NameType::Partition);
//! assert_eq!(name.partition_name(), Some("dateint=20240101/hour=3"));
//! assert_eq!(name.parent().unwrap().to_string(), "prodhive/events/clicks");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// The level of the hierarchy a name addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NameType {
    /// `catalog`
    Catalog,
    /// `catalog/database`
    Database,
    /// `catalog/database/table`
    Table,
    /// `catalog/database/table/partition`
    Partition,
}

impl NameType {
    /// Returns a lowercase label for logs and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Database => "database",
            Self::Table => "table",
            Self::Partition => "partition",
        }
    }
}

impl fmt::Display for NameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, structurally ordered catalog identifier.
///
/// A name at level N always carries every level below N; the constructors
/// make a partition name without a table name unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    catalog: String,
    database: Option<String>,
    table: Option<String>,
    partition: Option<String>,
}

impl QualifiedName {
    /// Creates a catalog-level name.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog segment is empty or contains `/`.
    pub fn catalog(catalog: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            catalog: standardize("catalog", catalog.as_ref())?,
            database: None,
            table: None,
            partition: None,
        })
    }

    /// Creates a database-level name.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is empty or contains `/`.
    pub fn database(catalog: impl AsRef<str>, database: impl AsRef<str>) -> Result<Self> {
        Self::catalog(catalog)?.with_database(database)
    }

    /// Creates a table-level name.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is empty or contains `/`.
    pub fn table(
        catalog: impl AsRef<str>,
        database: impl AsRef<str>,
        table: impl AsRef<str>,
    ) -> Result<Self> {
        Self::database(catalog, database)?.with_table(table)
    }

    /// Creates a partition-level name.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is empty or the upper segments contain `/`.
    pub fn partition(
        catalog: impl AsRef<str>,
        database: impl AsRef<str>,
        table: impl AsRef<str>,
        partition: impl AsRef<str>,
    ) -> Result<Self> {
        Self::table(catalog, database, table)?.with_partition(partition)
    }

    /// Returns a database name under this catalog name.
    ///
    /// # Errors
    ///
    /// Returns an error if `self` is not a catalog name or the segment is invalid.
    pub fn with_database(&self, database: impl AsRef<str>) -> Result<Self> {
        self.require(NameType::Catalog)?;
        Ok(Self {
            database: Some(standardize("database", database.as_ref())?),
            ..self.clone()
        })
    }

    /// Returns a table name under this database name.
    ///
    /// # Errors
    ///
    /// Returns an error if `self` is not a database name or the segment is invalid.
    pub fn with_table(&self, table: impl AsRef<str>) -> Result<Self> {
        self.require(NameType::Database)?;
        Ok(Self {
            table: Some(standardize("table", table.as_ref())?),
            ..self.clone()
        })
    }

    /// Returns a partition name under this table name.
    ///
    /// # Errors
    ///
    /// Returns an error if `self` is not a table name or the partition segment is empty.
    pub fn with_partition(&self, partition: impl AsRef<str>) -> Result<Self> {
        self.require(NameType::Table)?;
        let partition = partition.as_ref().trim();
        if partition.is_empty() {
            return Err(Error::invalid_name("partition name cannot be empty"));
        }
        Ok(Self {
            partition: Some(partition.to_string()),
            ..self.clone()
        })
    }

    /// Returns the catalog segment.
    #[must_use]
    pub fn catalog_name(&self) -> &str {
        &self.catalog
    }

    /// Returns the database segment, if present.
    #[must_use]
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Returns the table segment, if present.
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Returns the partition segment, if present.
    #[must_use]
    pub fn partition_name(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    /// Returns the level this name addresses.
    #[must_use]
    pub const fn name_type(&self) -> NameType {
        if self.partition.is_some() {
            NameType::Partition
        } else if self.table.is_some() {
            NameType::Table
        } else if self.database.is_some() {
            NameType::Database
        } else {
            NameType::Catalog
        }
    }

    /// Returns the enclosing name, or `None` for a catalog.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let mut parent = self.clone();
        match self.name_type() {
            NameType::Catalog => return None,
            NameType::Database => parent.database = None,
            NameType::Table => parent.table = None,
            NameType::Partition => parent.partition = None,
        }
        Some(parent)
    }

    /// Returns the ancestor at the given level.
    ///
    /// # Errors
    ///
    /// Returns an error if this name is above the requested level.
    pub fn ancestor(&self, level: NameType) -> Result<Self> {
        if self.name_type() < level {
            return Err(Error::invalid_name(format!(
                "'{self}' is a {} name and has no {level} component",
                self.name_type()
            )));
        }
        let mut name = self.clone();
        if level < NameType::Partition {
            name.partition = None;
        }
        if level < NameType::Table {
            name.table = None;
        }
        if level < NameType::Database {
            name.database = None;
        }
        Ok(name)
    }

    /// Fails unless this name addresses exactly `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] describing the mismatch.
    pub fn require(&self, expected: NameType) -> Result<()> {
        let actual = self.name_type();
        if actual == expected {
            Ok(())
        } else {
            Err(Error::invalid_name(format!(
                "expected a {expected} name but '{self}' is a {actual} name"
            )))
        }
    }
}

fn standardize(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid_name(format!("{field} name cannot be empty")));
    }
    if value.contains('/') {
        return Err(Error::invalid_name(format!(
            "{field} name '{value}' cannot contain '/'"
        )));
    }
    Ok(value.to_lowercase())
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.catalog)?;
        for segment in [&self.database, &self.table, &self.partition]
            .into_iter()
            .flatten()
        {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for QualifiedName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(4, '/');
        let catalog = parts.next().unwrap_or_default();
        let mut name = Self::catalog(catalog)?;
        if let Some(database) = parts.next() {
            name = name.with_database(database)?;
        }
        if let Some(table) = parts.next() {
            name = name.with_table(table)?;
        }
        if let Some(partition) = parts.next() {
            name = name.with_partition(partition)?;
        }
        Ok(name)
    }
}

impl Serialize for QualifiedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QualifiedName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

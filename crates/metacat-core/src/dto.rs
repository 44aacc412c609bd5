//! Transfer objects exchanged between callers, the catalog service, and
//! metadata stores.
//!
//! Metadata documents are `serde_json::Value`s with key order preserved.
//! Definition metadata is operator-curated and merged on update; data
//! metadata belongs to a physical location (`uri`) and is replaced when the
//! location changes.

use serde::{Deserialize, Serialize};

use crate::audit::AuditInfo;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::name::{NameType, QualifiedName};
use crate::partition::PartitionValues;
use crate::storage::StorageInfo;

/// Dynamic metadata document (ordered-key JSON).
pub type MetadataDoc = serde_json::Value;

/// A partition of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionDto {
    /// Partition-level qualified name.
    pub name: QualifiedName,
    /// Physical location and format.
    #[serde(default)]
    pub storage_info: StorageInfo,
    /// Operator-curated metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_metadata: Option<MetadataDoc>,
    /// Location-scoped metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_metadata: Option<MetadataDoc>,
    /// Audit trail; absent on incoming requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditInfo>,
    /// Whether the data lives outside the table location.
    #[serde(default)]
    pub data_external: bool,
}

impl PartitionDto {
    /// Creates a partition with empty storage and no metadata.
    ///
    /// # Errors
    ///
    /// Returns an error unless `name` is a partition-level name.
    pub fn new(name: QualifiedName) -> Result<Self> {
        name.require(NameType::Partition)?;
        Ok(Self {
            name,
            storage_info: StorageInfo::default(),
            definition_metadata: None,
            data_metadata: None,
            audit: None,
            data_external: false,
        })
    }

    /// Sets the storage info.
    #[must_use]
    pub fn with_storage(mut self, storage_info: StorageInfo) -> Self {
        self.storage_info = storage_info;
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.storage_info.uri = Some(uri.into());
        self
    }

    /// Sets the definition metadata.
    #[must_use]
    pub fn with_definition_metadata(mut self, doc: MetadataDoc) -> Self {
        self.definition_metadata = Some(doc);
        self
    }

    /// Sets the data metadata.
    #[must_use]
    pub fn with_data_metadata(mut self, doc: MetadataDoc) -> Self {
        self.data_metadata = Some(doc);
        self
    }

    /// Returns the partition-name segment (`k1=v1/k2=v2`).
    #[must_use]
    pub fn partition_name(&self) -> &str {
        self.name.partition_name().unwrap_or_default()
    }

    /// Returns the physical location, if set.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.storage_info.uri.as_deref()
    }

    /// Decodes the partition name into its key/value tuple.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition name is malformed.
    pub fn partition_values(&self) -> Result<PartitionValues> {
        Ok(PartitionValues::decode(self.partition_name())?)
    }
}

/// A table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDto {
    /// Table-level qualified name.
    pub name: QualifiedName,
    /// Columns, partition keys included.
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Physical location and format.
    #[serde(default)]
    pub storage_info: StorageInfo,
    /// Operator-curated metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_metadata: Option<MetadataDoc>,
    /// Location-scoped metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_metadata: Option<MetadataDoc>,
    /// Audit trail; absent on incoming requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditInfo>,
}

impl TableDto {
    /// Creates a table with the given fields.
    ///
    /// # Errors
    ///
    /// Returns an error unless `name` is a table-level name.
    pub fn new(name: QualifiedName, fields: Vec<Field>) -> Result<Self> {
        name.require(NameType::Table)?;
        Ok(Self {
            name,
            fields,
            storage_info: StorageInfo::default(),
            definition_metadata: None,
            data_metadata: None,
            audit: None,
        })
    }

    /// Sets the storage info.
    #[must_use]
    pub fn with_storage(mut self, storage_info: StorageInfo) -> Self {
        self.storage_info = storage_info;
        self
    }

    /// Sets the definition metadata.
    #[must_use]
    pub fn with_definition_metadata(mut self, doc: MetadataDoc) -> Self {
        self.definition_metadata = Some(doc);
        self
    }

    /// Partition-key fields in declaration order.
    pub fn partition_key_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_partition_key)
    }

    /// Partition-key names in declaration order.
    #[must_use]
    pub fn partition_keys(&self) -> Vec<&str> {
        self.partition_key_fields().map(|f| f.name.as_str()).collect()
    }

    /// Returns true if the table declares at least one partition key.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        self.fields.iter().any(|f| f.is_partition_key)
    }

    /// Builds the qualified name of a partition of this table.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition name is empty.
    pub fn partition_qualified_name(&self, partition_name: &str) -> Result<QualifiedName> {
        self.name.with_partition(partition_name)
    }
}

/// A database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDto {
    /// Database-level qualified name.
    pub name: QualifiedName,
    /// Operator-curated metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_metadata: Option<MetadataDoc>,
    /// Audit trail; absent on incoming requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditInfo>,
    /// Table names (filled on reads).
    #[serde(default)]
    pub tables: Vec<String>,
}

impl DatabaseDto {
    /// Creates a database with no metadata.
    ///
    /// # Errors
    ///
    /// Returns an error unless `name` is a database-level name.
    pub fn new(name: QualifiedName) -> Result<Self> {
        name.require(NameType::Database)?;
        Ok(Self {
            name,
            definition_metadata: None,
            audit: None,
            tables: Vec::new(),
        })
    }

    /// Sets the definition metadata.
    #[must_use]
    pub fn with_definition_metadata(mut self, doc: MetadataDoc) -> Self {
        self.definition_metadata = Some(doc);
        self
    }
}

/// A catalog: one backend metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDto {
    /// Catalog-level qualified name.
    pub name: QualifiedName,
    /// Operator-curated metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_metadata: Option<MetadataDoc>,
    /// Database names.
    #[serde(default)]
    pub databases: Vec<String>,
}

/// Fails unless `name` is a table-level name.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] otherwise.
pub fn require_table_name(name: &QualifiedName) -> Result<()> {
    name.require(NameType::Table)
        .map_err(|_| Error::invalid_name(format!("'{name}' is not a table name")))
}

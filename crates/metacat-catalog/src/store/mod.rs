//! Pluggable persistence for catalog state.
//!
//! Two traits split the state the catalog service manages:
//!
//! - [`MetadataStore`]: one per catalog. The backend's own view of
//!   databases, tables, and partitions (names, fields, storage, audit).
//! - [`UserMetadataStore`]: shared across catalogs. Business metadata the
//!   backends cannot hold: definition metadata keyed by qualified name and
//!   data metadata keyed by location.
//!
//! ## Design Principles
//!
//! - **Backend owns structure**: documents handed to a [`MetadataStore`]
//!   carry no user metadata; the service strips it before writing.
//! - **One batch per save**: a partition save reaches the backend as a single
//!   [`MetadataStore::save_partitions`] call.
//! - **Testability**: in-memory implementations in [`memory`].

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use metacat_core::{DatabaseDto, MetadataDoc, PartitionDto, QualifiedName, TableDto};

use crate::filter::PartitionFilter;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed entity does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Description of the missing entity.
        message: String,
    },

    /// The entity to create already exists.
    #[error("already exists: {message}")]
    AlreadyExists {
        /// Description of the existing entity.
        message: String,
    },

    /// The write would break a backend integrity rule.
    #[error("integrity violation: {message}")]
    IntegrityViolation {
        /// Description of the violated rule.
        message: String,
    },

    /// The backend is temporarily unreachable or overloaded.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// Any other backend failure.
    #[error("store error: {message}")]
    Other {
        /// Description of the failure.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Creates an integrity-violation error.
    #[must_use]
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::IntegrityViolation {
            message: message.into(),
        }
    }

    /// Creates an error without an underlying cause.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// One partition save as the backend sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionBatch {
    /// Partitions to insert.
    pub added: Vec<PartitionDto>,
    /// Partitions to overwrite.
    pub updated: Vec<PartitionDto>,
    /// Partition names (`k=v/...`) to remove.
    pub deleted: Vec<String>,
}

impl PartitionBatch {
    /// Returns true if the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Backend metadata for one catalog.
///
/// Implementations may block arbitrarily; callers hold no locks across
/// calls. Names passed in are already validated at the right level.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // --- Databases ---

    /// Lists database names in the catalog, sorted.
    async fn list_databases(&self) -> StoreResult<Vec<String>>;

    /// Gets a database. Returns `None` if it does not exist.
    async fn get_database(&self, name: &QualifiedName) -> StoreResult<Option<DatabaseDto>>;

    /// Creates a database. Fails with `AlreadyExists` if present.
    async fn create_database(&self, database: &DatabaseDto) -> StoreResult<()>;

    /// Overwrites a database. Fails with `NotFound` if absent.
    async fn update_database(&self, database: &DatabaseDto) -> StoreResult<()>;

    /// Deletes a database. Fails with `IntegrityViolation` if it still has
    /// tables.
    async fn delete_database(&self, name: &QualifiedName) -> StoreResult<()>;

    // --- Tables ---

    /// Lists table names in a database, sorted.
    async fn list_tables(&self, database: &QualifiedName) -> StoreResult<Vec<String>>;

    /// Gets a table. Returns `None` if it does not exist.
    async fn get_table(&self, name: &QualifiedName) -> StoreResult<Option<TableDto>>;

    /// Creates a table. Fails with `AlreadyExists` if present.
    async fn create_table(&self, table: &TableDto) -> StoreResult<()>;

    /// Overwrites a table. Fails with `NotFound` if absent.
    async fn update_table(&self, table: &TableDto) -> StoreResult<()>;

    /// Deletes a table together with its partitions.
    async fn delete_table(&self, name: &QualifiedName) -> StoreResult<()>;

    // --- Partitions ---

    /// Lists partitions of a table in name order.
    ///
    /// `filter` is only passed to stores whose catalog declares predicate
    /// pushdown; such stores must return exactly the matching partitions.
    async fn list_partitions(
        &self,
        table: &QualifiedName,
        filter: Option<&PartitionFilter>,
    ) -> StoreResult<Vec<PartitionDto>>;

    /// Gets the named partitions of a table. Unknown names are skipped.
    async fn get_partitions_by_names(
        &self,
        table: &QualifiedName,
        names: &[String],
    ) -> StoreResult<Vec<PartitionDto>>;

    /// Counts the partitions of a table.
    async fn partition_count(&self, table: &QualifiedName) -> StoreResult<usize>;

    /// Applies one partition batch atomically.
    async fn save_partitions(&self, table: &QualifiedName, batch: PartitionBatch)
    -> StoreResult<()>;
}

/// Business metadata side-store shared by all catalogs.
#[async_trait]
pub trait UserMetadataStore: Send + Sync {
    /// Gets definition metadata for the given names. Names without a
    /// document are absent from the result.
    async fn get_definition_metadata(
        &self,
        names: &[QualifiedName],
    ) -> StoreResult<HashMap<QualifiedName, MetadataDoc>>;

    /// Replaces definition metadata for the given names.
    async fn save_definition_metadata(
        &self,
        entries: Vec<(QualifiedName, MetadataDoc)>,
    ) -> StoreResult<()>;

    /// Deletes definition metadata for the given names.
    async fn delete_definition_metadata(&self, names: &[QualifiedName]) -> StoreResult<()>;

    /// Gets data metadata for the given locations.
    async fn get_data_metadata(&self, uris: &[String])
    -> StoreResult<HashMap<String, MetadataDoc>>;

    /// Replaces data metadata for the given locations.
    async fn save_data_metadata(&self, entries: Vec<(String, MetadataDoc)>) -> StoreResult<()>;

    /// Deletes data metadata for the given locations.
    async fn delete_data_metadata(&self, uris: &[String]) -> StoreResult<()>;
}

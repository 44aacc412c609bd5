//! # metacat-core
//!
//! Core abstractions for the metacat federated metadata catalog.
//!
//! This crate provides the foundational types used across all metacat
//! components:
//!
//! - **Qualified Names**: `catalog/database/table/partition` identifiers
//! - **Partition Names**: The `key=value/...` codec and typed key values
//! - **Model**: Fields, storage descriptors, audit trails, transfer objects
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `metacat-core` holds only shared primitives. Filter evaluation, metadata
//! merging, partition reconciliation, and store traits live in
//! `metacat-catalog`.
//!
//! ## Example
//!
//! ```rust
//! use metacat_core::prelude::*;
//!
//! let table = QualifiedName::table("prodhive", "events", "clicks").unwrap();
//!
//! let mut values = PartitionValues::new();
//! values.push("dateint", "20240101");
//! let partition = table.with_partition(values.encode()).unwrap();
//!
//! assert_eq!(partition.to_string(), "prodhive/events/clicks/dateint=20240101");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod clock;
pub mod context;
pub mod dto;
pub mod error;
pub mod field;
pub mod name;
pub mod observability;
pub mod partition;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use metacat_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::audit::AuditInfo;
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::context::RequestContext;
    pub use crate::dto::{CatalogDto, DatabaseDto, MetadataDoc, PartitionDto, TableDto};
    pub use crate::error::{Error, Result};
    pub use crate::field::{Field, FieldType};
    pub use crate::name::{NameType, QualifiedName};
    pub use crate::partition::{PartitionNameError, PartitionValues, ScalarValue};
    pub use crate::storage::StorageInfo;
}

// Re-export key types at crate root for ergonomics
pub use audit::AuditInfo;
pub use clock::{Clock, SystemClock};
pub use context::{RequestContext, RequestId};
pub use dto::{CatalogDto, DatabaseDto, MetadataDoc, PartitionDto, TableDto};
pub use error::{Error, Result};
pub use field::{Field, FieldType};
pub use name::{NameType, QualifiedName};
pub use observability::{LogFormat, catalog_span, init_logging};
pub use partition::{NULL_PARTITION_VALUE, PartitionNameError, PartitionValues, ScalarValue};
pub use storage::StorageInfo;

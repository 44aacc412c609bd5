//! # metacat-catalog
//!
//! Partition metadata engine for the metacat federated catalog.
//!
//! This crate implements the catalog domain, providing:
//!
//! - **Filter Engine**: Parses partition filter expressions and evaluates
//!   them against typed partition key values
//! - **Metadata Merge**: Deep-merges user-supplied JSON metadata documents,
//!   with location-gated replacement for data metadata
//! - **Partition Reconciliation**: Classifies a saved batch into added,
//!   updated, and unchanged partitions so resubmits write nothing
//! - **Lifecycle Controller**: [`CatalogService`] runs catalog, database,
//!   table, and partition operations against pluggable stores
//!
//! ## Architecture
//!
//! Structural metadata (databases, tables, partitions) lives in a
//! per-catalog [`MetadataStore`]. User metadata lives in a shared
//! [`UserMetadataStore`]: definition metadata keyed by qualified name, data
//! metadata keyed by storage location. The engines in [`filter`], [`merge`],
//! and [`reconcile`] are pure; only [`service`] touches stores.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use metacat_catalog::prelude::*;
//! use metacat_core::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryMetadataStore::new());
//! let service = CatalogService::new(
//!     Arc::new(InMemoryUserMetadataStore::new()),
//!     Arc::new(SystemClock),
//! )
//! .with_catalog(CatalogConfig::new("prodhive"), store);
//!
//! let ctx = RequestContext::new("alice");
//! let db = QualifiedName::database("prodhive", "events").unwrap();
//! service.create_database(&ctx, DatabaseDto::new(db.clone()).unwrap()).await.unwrap();
//!
//! let table = db.with_table("clicks").unwrap();
//! let fields = vec![Field::partition_key("dateint", FieldType::Int, 0)];
//! service.create_table(&ctx, TableDto::new(table.clone(), fields).unwrap()).await.unwrap();
//!
//! let partition = PartitionDto::new(table.with_partition("dateint=20240101").unwrap()).unwrap();
//! service
//!     .save_partitions(&ctx, &table, SavePartitionsRequest::new(vec![partition]))
//!     .await
//!     .unwrap();
//!
//! let names = service
//!     .get_partition_keys(&table, &GetPartitionsRequest::filtered("dateint >= 20240101"))
//!     .await
//!     .unwrap();
//! assert_eq!(names, vec!["dateint=20240101"]);
//! # });
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod filter;
pub mod merge;
pub mod metrics;
pub mod reconcile;
pub mod request;
pub mod service;
pub mod store;

// Re-export main types at crate root
pub use config::{CatalogCapabilities, CatalogConfig};
pub use error::{CatalogError, Result};
pub use filter::{FilterError, FilterOptions, PartitionFilter, Predicate};
pub use reconcile::{ReconcileContext, Reconciliation};
pub use request::{
    GetPartitionsRequest, Pageable, SavePartitionsRequest, SavePartitionsResponse, Sort, SortBy,
    SortOrder,
};
pub use service::CatalogService;
pub use store::memory::{InMemoryMetadataStore, InMemoryUserMetadataStore};
pub use store::{MetadataStore, PartitionBatch, StoreError, UserMetadataStore};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{CatalogCapabilities, CatalogConfig};
    pub use crate::error::CatalogError;
    pub use crate::filter::PartitionFilter;
    pub use crate::request::{
        GetPartitionsRequest, SavePartitionsRequest, SavePartitionsResponse, SortBy, SortOrder,
    };
    pub use crate::service::CatalogService;
    pub use crate::store::memory::{InMemoryMetadataStore, InMemoryUserMetadataStore};
    pub use crate::store::{MetadataStore, UserMetadataStore};
}

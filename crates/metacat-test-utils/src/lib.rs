//! Shared test utilities for metacat integration tests.
//!
//! This crate provides:
//! - [`TestContext`]: A catalog service wired to in-memory stores
//! - [`PartitionFixtures`]: Factory functions for tables and partitions
//! - [`SimulatedClock`]: Manually advanced time for audit assertions
//! - Custom assertion helpers for [`CatalogError`](metacat_catalog::CatalogError)
//!
//! # Example
//!
//! ```rust,ignore
//! use metacat_test_utils::{TestContext, PartitionFixtures};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     let table = ctx.sixteen_partition_table().await;
//!     // ... run test ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod simulation;

pub use assertions::*;
pub use fixtures::*;
pub use simulation::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("metacat_catalog=debug".parse().expect("valid directive"))
                .add_directive("metacat_core=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

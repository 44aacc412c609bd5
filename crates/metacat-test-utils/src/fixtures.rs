//! Pre-built test fixtures for common test scenarios.
//!
//! Provides a ready-wired [`TestContext`] and factory functions to create
//! tables and partitions with sensible defaults.

use std::sync::Arc;

use metacat_catalog::{
    CatalogCapabilities, CatalogConfig, CatalogService, InMemoryMetadataStore,
    InMemoryUserMetadataStore, SavePartitionsRequest,
};
use metacat_core::{
    DatabaseDto, Field, FieldType, PartitionDto, PartitionValues, QualifiedName, RequestContext,
    TableDto,
};

use crate::simulation::SimulatedClock;

/// Catalog name used by [`TestContext`].
pub const TEST_CATALOG: &str = "testhive";

/// Test context with a catalog service over in-memory stores.
pub struct TestContext {
    /// Service under test, with one catalog registered as [`TEST_CATALOG`].
    pub service: CatalogService,
    /// Backend of the registered catalog.
    pub store: Arc<InMemoryMetadataStore>,
    /// User-metadata side-store.
    pub user_metadata: Arc<InMemoryUserMetadataStore>,
    /// Clock the service stamps audit records with.
    pub clock: Arc<SimulatedClock>,
    /// Request context used by the helpers.
    pub request: RequestContext,
    /// Database created on demand by [`TestContext::create_database`].
    pub database: QualifiedName,
}

impl TestContext {
    /// Creates a context with default capabilities and a unique database name.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(CatalogCapabilities::default())
    }

    /// Creates a context whose catalog has the given capabilities.
    #[must_use]
    pub fn with_capabilities(capabilities: CatalogCapabilities) -> Self {
        Self::with_config(CatalogConfig::with_capabilities(TEST_CATALOG, capabilities))
    }

    /// Creates a context from a full catalog config.
    ///
    /// The config's name is replaced by [`TEST_CATALOG`].
    #[must_use]
    pub fn with_config(config: CatalogConfig) -> Self {
        let config = CatalogConfig {
            name: TEST_CATALOG.to_string(),
            ..config
        };
        let store = Arc::new(InMemoryMetadataStore::new());
        let user_metadata = Arc::new(InMemoryUserMetadataStore::new());
        let clock = Arc::new(SimulatedClock::deterministic());
        let service = CatalogService::new(user_metadata.clone(), clock.clone())
            .with_catalog(config, store.clone());
        let database = QualifiedName::database(
            TEST_CATALOG,
            format!("db_{}", uuid::Uuid::new_v4().as_simple()),
        )
        .expect("valid database name");

        Self {
            service,
            store,
            user_metadata,
            clock,
            request: RequestContext::new("test-user"),
            database,
        }
    }

    /// Creates [`Self::database`] and returns its name.
    pub async fn create_database(&self) -> QualifiedName {
        self.service
            .create_database(
                &self.request,
                DatabaseDto::new(self.database.clone()).expect("database name"),
            )
            .await
            .expect("create database");
        self.database.clone()
    }

    /// Creates a table with `fields` in [`Self::database`], creating the
    /// database first if needed.
    pub async fn create_table(&self, table: &str, fields: Vec<Field>) -> QualifiedName {
        if self.service.get_database(&self.database).await.is_err() {
            self.create_database().await;
        }
        let name = self.database.with_table(table).expect("valid table name");
        self.service
            .create_table(
                &self.request,
                TableDto::new(name.clone(), fields).expect("table name"),
            )
            .await
            .expect("create table");
        name
    }

    /// Creates the [`PartitionFixtures::fields`] table and saves its sixteen
    /// partitions.
    pub async fn sixteen_partition_table(&self) -> QualifiedName {
        let table = self
            .create_table("parts", PartitionFixtures::fields())
            .await;
        self.service
            .save_partitions(
                &self.request,
                &table,
                SavePartitionsRequest::new(PartitionFixtures::sixteen_partitions(&table)),
            )
            .await
            .expect("save partitions");
        table
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory for partitioned test tables.
///
/// The standard table has one regular column and three partition keys:
///
/// | key | type   | value for `n` in `0..16`       |
/// |-----|--------|--------------------------------|
/// | pk1 | string | `"even"` or `"odd"` by parity  |
/// | pk2 | int    | `n`                            |
/// | pk3 | int    | `n % 2`                        |
pub struct PartitionFixtures;

impl PartitionFixtures {
    /// Fields of the standard partitioned table.
    #[must_use]
    pub fn fields() -> Vec<Field> {
        vec![
            Field::new("payload", FieldType::String, 0),
            Field::partition_key("pk1", FieldType::String, 1),
            Field::partition_key("pk2", FieldType::Int, 2),
            Field::partition_key("pk3", FieldType::Int, 3),
        ]
    }

    /// Partition name of the `n`th standard partition.
    #[must_use]
    pub fn name(n: u32) -> String {
        let mut values = PartitionValues::new();
        values.push("pk1", if n % 2 == 0 { "even" } else { "odd" });
        values.push("pk2", n.to_string());
        values.push("pk3", (n % 2).to_string());
        values.encode()
    }

    /// Location of the `n`th standard partition.
    #[must_use]
    pub fn uri(table: &QualifiedName, n: u32) -> String {
        format!("s3://warehouse/{}/{}", table.table_name().unwrap_or("t"), Self::name(n))
    }

    /// The `n`th standard partition, with a location.
    #[must_use]
    pub fn partition(table: &QualifiedName, n: u32) -> PartitionDto {
        PartitionDto::new(table.with_partition(Self::name(n)).expect("partition name"))
            .expect("partition dto")
            .with_uri(Self::uri(table, n))
    }

    /// All sixteen standard partitions.
    #[must_use]
    pub fn sixteen_partitions(table: &QualifiedName) -> Vec<PartitionDto> {
        (0..16).map(|n| Self::partition(table, n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_names() {
        assert_eq!(PartitionFixtures::name(0), "pk1=even/pk2=0/pk3=0");
        assert_eq!(PartitionFixtures::name(7), "pk1=odd/pk2=7/pk3=1");
    }

    #[tokio::test]
    async fn sixteen_partition_table_is_populated() {
        let ctx = TestContext::new();
        let table = ctx.sixteen_partition_table().await;
        assert_eq!(ctx.service.get_partition_count(&table).await.unwrap(), 16);
    }
}

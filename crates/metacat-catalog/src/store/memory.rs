//! In-memory store implementations for testing.
//!
//! This module provides [`InMemoryMetadataStore`] and
//! [`InMemoryUserMetadataStore`], simple in-memory implementations of the
//! store traits suitable for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process coordination
//! - **No persistence**: All state is lost when the process exits

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;

use metacat_core::{DatabaseDto, MetadataDoc, NameType, PartitionDto, QualifiedName, TableDto};

use super::{MetadataStore, PartitionBatch, StoreError, StoreResult, UserMetadataStore};
use crate::filter::PartitionFilter;

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::other("lock poisoned")
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeMap<QualifiedName, DatabaseDto>,
    tables: BTreeMap<QualifiedName, TableDto>,
    partitions: BTreeMap<QualifiedName, BTreeMap<String, PartitionDto>>,
}

impl State {
    fn tables_in(&self, database: &QualifiedName) -> impl Iterator<Item = &TableDto> {
        self.tables
            .values()
            .filter(move |t| t.name.ancestor(NameType::Database).ok().as_ref() == Some(database))
    }
}

/// In-memory backend for one catalog.
///
/// Applies pushed-down filters itself, counts writes, and can be told to
/// fail its next mutation.
///
/// ## Example
///
/// ```rust
/// use metacat_catalog::store::memory::InMemoryMetadataStore;
///
/// let store = InMemoryMetadataStore::new();
/// assert_eq!(store.write_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    state: RwLock<State>,
    writes: AtomicU64,
    filtered_lists: AtomicU64,
    fail_next: Mutex<Option<StoreError>>,
}

impl InMemoryMetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful mutating calls so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of partition listings that received a pushed-down filter.
    #[must_use]
    pub fn filtered_list_count(&self) -> u64 {
        self.filtered_lists.load(Ordering::SeqCst)
    }

    /// Makes the next mutating call fail with `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail_next_write(&self, error: StoreError) -> StoreResult<()> {
        *self.fail_next.lock().map_err(poison_err)? = Some(error);
        Ok(())
    }

    fn begin_write(&self) -> StoreResult<()> {
        match self.fail_next.lock().map_err(poison_err)?.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn finish_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn list_databases(&self) -> StoreResult<Vec<String>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .databases
            .keys()
            .filter_map(|name| name.database_name().map(ToString::to_string))
            .collect())
    }

    async fn get_database(&self, name: &QualifiedName) -> StoreResult<Option<DatabaseDto>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.databases.get(name).cloned())
    }

    async fn create_database(&self, database: &DatabaseDto) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.state.write().map_err(poison_err)?;
        if state.databases.contains_key(&database.name) {
            return Err(StoreError::already_exists(format!("database {}", database.name)));
        }
        state.databases.insert(database.name.clone(), database.clone());
        self.finish_write();
        Ok(())
    }

    async fn update_database(&self, database: &DatabaseDto) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.state.write().map_err(poison_err)?;
        let slot = state
            .databases
            .get_mut(&database.name)
            .ok_or_else(|| StoreError::not_found(format!("database {}", database.name)))?;
        *slot = database.clone();
        self.finish_write();
        Ok(())
    }

    async fn delete_database(&self, name: &QualifiedName) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.state.write().map_err(poison_err)?;
        if !state.databases.contains_key(name) {
            return Err(StoreError::not_found(format!("database {name}")));
        }
        if state.tables_in(name).next().is_some() {
            return Err(StoreError::integrity(format!("database {name} is not empty")));
        }
        state.databases.remove(name);
        self.finish_write();
        Ok(())
    }

    async fn list_tables(&self, database: &QualifiedName) -> StoreResult<Vec<String>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .tables_in(database)
            .filter_map(|t| t.name.table_name().map(ToString::to_string))
            .collect())
    }

    async fn get_table(&self, name: &QualifiedName) -> StoreResult<Option<TableDto>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.tables.get(name).cloned())
    }

    async fn create_table(&self, table: &TableDto) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.state.write().map_err(poison_err)?;
        let database = table
            .name
            .ancestor(NameType::Database)
            .map_err(|e| StoreError::with_source("invalid table name", e))?;
        if !state.databases.contains_key(&database) {
            return Err(StoreError::not_found(format!("database {database}")));
        }
        if state.tables.contains_key(&table.name) {
            return Err(StoreError::already_exists(format!("table {}", table.name)));
        }
        state.tables.insert(table.name.clone(), table.clone());
        self.finish_write();
        Ok(())
    }

    async fn update_table(&self, table: &TableDto) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.state.write().map_err(poison_err)?;
        let slot = state
            .tables
            .get_mut(&table.name)
            .ok_or_else(|| StoreError::not_found(format!("table {}", table.name)))?;
        *slot = table.clone();
        self.finish_write();
        Ok(())
    }

    async fn delete_table(&self, name: &QualifiedName) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.state.write().map_err(poison_err)?;
        if state.tables.remove(name).is_none() {
            return Err(StoreError::not_found(format!("table {name}")));
        }
        state.partitions.remove(name);
        self.finish_write();
        Ok(())
    }

    async fn list_partitions(
        &self,
        table: &QualifiedName,
        filter: Option<&PartitionFilter>,
    ) -> StoreResult<Vec<PartitionDto>> {
        if filter.is_some() {
            self.filtered_lists.fetch_add(1, Ordering::SeqCst);
        }
        let state = self.state.read().map_err(poison_err)?;
        let Some(partitions) = state.partitions.get(table) else {
            return Ok(Vec::new());
        };
        Ok(partitions
            .iter()
            .filter(|(name, _)| filter.is_none_or(|f| f.matches_name(name)))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn get_partitions_by_names(
        &self,
        table: &QualifiedName,
        names: &[String],
    ) -> StoreResult<Vec<PartitionDto>> {
        let state = self.state.read().map_err(poison_err)?;
        let Some(partitions) = state.partitions.get(table) else {
            return Ok(Vec::new());
        };
        Ok(names
            .iter()
            .filter_map(|name| partitions.get(name).cloned())
            .collect())
    }

    async fn partition_count(&self, table: &QualifiedName) -> StoreResult<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.partitions.get(table).map_or(0, BTreeMap::len))
    }

    async fn save_partitions(
        &self,
        table: &QualifiedName,
        batch: PartitionBatch,
    ) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.state.write().map_err(poison_err)?;
        if !state.tables.contains_key(table) {
            return Err(StoreError::not_found(format!("table {table}")));
        }
        let partitions = state.partitions.entry(table.clone()).or_default();

        // Check the whole batch before touching anything.
        if let Some(p) = batch
            .added
            .iter()
            .find(|p| partitions.contains_key(p.partition_name()))
        {
            return Err(StoreError::already_exists(format!("partition {}", p.name)));
        }
        if let Some(p) = batch
            .updated
            .iter()
            .find(|p| !partitions.contains_key(p.partition_name()))
        {
            return Err(StoreError::not_found(format!("partition {}", p.name)));
        }

        for name in &batch.deleted {
            partitions.remove(name);
        }
        for partition in batch.added.into_iter().chain(batch.updated) {
            partitions.insert(partition.partition_name().to_string(), partition);
        }
        self.finish_write();
        Ok(())
    }
}

/// In-memory business metadata side-store.
#[derive(Debug, Default)]
pub struct InMemoryUserMetadataStore {
    definitions: RwLock<HashMap<QualifiedName, MetadataDoc>>,
    data: RwLock<HashMap<String, MetadataDoc>>,
}

impl InMemoryUserMetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored definition documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn definition_count(&self) -> StoreResult<usize> {
        Ok(self.definitions.read().map_err(poison_err)?.len())
    }

    /// Number of stored data documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn data_count(&self) -> StoreResult<usize> {
        Ok(self.data.read().map_err(poison_err)?.len())
    }
}

#[async_trait]
impl UserMetadataStore for InMemoryUserMetadataStore {
    async fn get_definition_metadata(
        &self,
        names: &[QualifiedName],
    ) -> StoreResult<HashMap<QualifiedName, MetadataDoc>> {
        let definitions = self.definitions.read().map_err(poison_err)?;
        Ok(names
            .iter()
            .filter_map(|n| definitions.get(n).map(|doc| (n.clone(), doc.clone())))
            .collect())
    }

    async fn save_definition_metadata(
        &self,
        entries: Vec<(QualifiedName, MetadataDoc)>,
    ) -> StoreResult<()> {
        let mut definitions = self.definitions.write().map_err(poison_err)?;
        definitions.extend(entries);
        Ok(())
    }

    async fn delete_definition_metadata(&self, names: &[QualifiedName]) -> StoreResult<()> {
        let mut definitions = self.definitions.write().map_err(poison_err)?;
        for name in names {
            definitions.remove(name);
        }
        Ok(())
    }

    async fn get_data_metadata(
        &self,
        uris: &[String],
    ) -> StoreResult<HashMap<String, MetadataDoc>> {
        let data = self.data.read().map_err(poison_err)?;
        Ok(uris
            .iter()
            .filter_map(|u| data.get(u).map(|doc| (u.clone(), doc.clone())))
            .collect())
    }

    async fn save_data_metadata(&self, entries: Vec<(String, MetadataDoc)>) -> StoreResult<()> {
        let mut data = self.data.write().map_err(poison_err)?;
        data.extend(entries);
        Ok(())
    }

    async fn delete_data_metadata(&self, uris: &[String]) -> StoreResult<()> {
        let mut data = self.data.write().map_err(poison_err)?;
        for uri in uris {
            data.remove(uri);
        }
        Ok(())
    }
}

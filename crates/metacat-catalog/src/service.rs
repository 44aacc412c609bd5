//! Catalog lifecycle controller.
//!
//! [`CatalogService`] is the single entry point for catalog, database,
//! table, and partition operations across every registered catalog. For
//! each request it:
//!
//! 1. validates names, capability flags, and request payloads locally,
//! 2. checks parent and target existence against the catalog's backend,
//! 3. runs the pure engines ([`filter`](crate::filter),
//!    [`merge`](crate::merge), [`reconcile`](crate::reconcile)),
//! 4. writes the backend in one call, then the user-metadata side-store.
//!
//! The service holds no lock across store calls; registered catalogs are
//! fixed at construction.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use metacat_core::field::{relocate_partition_keys, validate_fields};
use metacat_core::{
    AuditInfo, CatalogDto, Clock, DatabaseDto, MetadataDoc, NameType, PartitionDto,
    QualifiedName, RequestContext, TableDto, catalog_span,
};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::filter::PartitionFilter;
use crate::merge::{self, merge_data_metadata};
use crate::metrics::{self, FilterMode};
use crate::reconcile::{
    ReconcileContext, canonical_partition_name, canonicalize_batch, reconcile,
};
use crate::request::{
    GetPartitionsRequest, Sort, SortBy, SortOrder, SavePartitionsRequest, SavePartitionsResponse,
};
use crate::store::{MetadataStore, PartitionBatch, UserMetadataStore};

struct RegisteredCatalog {
    config: CatalogConfig,
    store: Arc<dyn MetadataStore>,
}

/// Lifecycle controller over all registered catalogs.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use metacat_catalog::config::CatalogConfig;
/// use metacat_catalog::service::CatalogService;
/// use metacat_catalog::store::memory::{InMemoryMetadataStore, InMemoryUserMetadataStore};
/// use metacat_core::SystemClock;
///
/// let service = CatalogService::new(
///     Arc::new(InMemoryUserMetadataStore::new()),
///     Arc::new(SystemClock),
/// )
/// .with_catalog(CatalogConfig::new("prodhive"), Arc::new(InMemoryMetadataStore::new()));
///
/// assert_eq!(service.catalog_names(), vec!["prodhive"]);
/// ```
pub struct CatalogService {
    catalogs: HashMap<String, RegisteredCatalog>,
    user_metadata: Arc<dyn UserMetadataStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService")
            .field("catalogs", &self.catalog_names())
            .finish_non_exhaustive()
    }
}

impl CatalogService {
    /// Creates a service with no catalogs.
    #[must_use]
    pub fn new(user_metadata: Arc<dyn UserMetadataStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalogs: HashMap::new(),
            user_metadata,
            clock,
        }
    }

    /// Registers a catalog backed by `store`, replacing any catalog of the
    /// same name.
    #[must_use]
    pub fn with_catalog(mut self, config: CatalogConfig, store: Arc<dyn MetadataStore>) -> Self {
        tracing::info!(
            catalog = %config.name,
            pushdown = config.capabilities.supports_predicate_pushdown,
            "Registered catalog"
        );
        self.catalogs
            .insert(config.name.clone(), RegisteredCatalog { config, store });
        self
    }

    /// Names of registered catalogs, sorted.
    #[must_use]
    pub fn catalog_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.catalogs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Configuration of a registered catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the catalog is not registered.
    pub fn catalog_config(&self, catalog: &str) -> Result<&CatalogConfig> {
        self.catalogs
            .get(&catalog.trim().to_lowercase())
            .map(|c| &c.config)
            .ok_or_else(|| CatalogError::not_found("catalog", catalog))
    }

    fn registered(&self, name: &QualifiedName) -> Result<&RegisteredCatalog> {
        self.catalogs
            .get(name.catalog_name())
            .ok_or_else(|| CatalogError::not_found("catalog", name.catalog_name()))
    }

    // ========================================================================
    // Catalogs
    // ========================================================================

    /// Gets a catalog with its database names and definition metadata.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a non-catalog name and `NotFound` for an
    /// unregistered catalog.
    pub async fn get_catalog(&self, name: &QualifiedName) -> Result<CatalogDto> {
        observe("get_catalog", name, async {
            name.require(NameType::Catalog)?;
            self.load_catalog(name).await
        })
        .await
    }

    /// Merges `metadata` into a catalog's definition metadata.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a non-catalog name and `NotFound` for an
    /// unregistered catalog.
    pub async fn update_catalog_metadata(
        &self,
        ctx: &RequestContext,
        name: &QualifiedName,
        metadata: MetadataDoc,
    ) -> Result<CatalogDto> {
        observe("update_catalog_metadata", name, async {
            name.require(NameType::Catalog)?;
            self.registered(name)?;
            self.merge_definition(name, Some(&metadata)).await?;
            tracing::info!(request_id = %ctx.request_id, actor = %ctx.actor, "Updated catalog metadata");
            self.load_catalog(name).await
        })
        .await
    }

    async fn load_catalog(&self, name: &QualifiedName) -> Result<CatalogDto> {
        let catalog = self.registered(name)?;
        let databases = catalog.store.list_databases().await?;
        let definition_metadata = self.definition_of(name).await?;
        Ok(CatalogDto {
            name: name.clone(),
            definition_metadata,
            databases,
        })
    }

    // ========================================================================
    // Databases
    // ========================================================================

    /// Creates a database.
    ///
    /// # Errors
    ///
    /// Returns `NotSupported` if the catalog disallows database creation and
    /// `AlreadyExists` if the database exists.
    pub async fn create_database(
        &self,
        ctx: &RequestContext,
        database: DatabaseDto,
    ) -> Result<DatabaseDto> {
        let name = database.name.clone();
        observe("create_database", &name, async {
            name.require(NameType::Database)?;
            let catalog = self.registered(&name)?;
            if !catalog.config.capabilities.can_create_database {
                return Err(CatalogError::not_supported(format!(
                    "catalog {} does not allow creating databases",
                    catalog.config.name
                )));
            }
            if catalog.store.get_database(&name).await?.is_some() {
                return Err(CatalogError::already_exists("database", &name));
            }

            let stored = DatabaseDto {
                name: name.clone(),
                definition_metadata: None,
                audit: Some(AuditInfo::created(&ctx.actor, self.clock.now())),
                tables: Vec::new(),
            };
            catalog.store.create_database(&stored).await?;
            self.merge_definition(&name, database.definition_metadata.as_ref())
                .await?;

            tracing::info!(request_id = %ctx.request_id, actor = %ctx.actor, "Created database");
            self.load_database(catalog, &name).await
        })
        .await
    }

    /// Gets a database with its table names and definition metadata.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the catalog or database does not exist.
    pub async fn get_database(&self, name: &QualifiedName) -> Result<DatabaseDto> {
        observe("get_database", name, async {
            name.require(NameType::Database)?;
            let catalog = self.registered(name)?;
            self.load_database(catalog, name).await
        })
        .await
    }

    /// Merges a database's definition metadata.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the database does not exist.
    pub async fn update_database(
        &self,
        ctx: &RequestContext,
        database: DatabaseDto,
    ) -> Result<DatabaseDto> {
        let name = database.name.clone();
        observe("update_database", &name, async {
            name.require(NameType::Database)?;
            let catalog = self.registered(&name)?;
            let mut stored = catalog
                .store
                .get_database(&name)
                .await?
                .ok_or_else(|| CatalogError::not_found("database", &name))?;

            if self
                .merge_definition(&name, database.definition_metadata.as_ref())
                .await?
            {
                stored.audit = Some(touch(stored.audit.as_ref(), &ctx.actor, self.clock.now()));
                catalog.store.update_database(&stored).await?;
                tracing::info!(request_id = %ctx.request_id, actor = %ctx.actor, "Updated database");
            }
            self.load_database(catalog, &name).await
        })
        .await
    }

    /// Deletes an empty database and its definition metadata.
    ///
    /// # Errors
    ///
    /// Returns `NotSupported` if the catalog disallows database deletion,
    /// `NotFound` if the database does not exist, and a retryable
    /// `Conflict` if it still has tables.
    pub async fn delete_database(&self, ctx: &RequestContext, name: &QualifiedName) -> Result<()> {
        observe("delete_database", name, async {
            name.require(NameType::Database)?;
            let catalog = self.registered(name)?;
            if !catalog.config.capabilities.can_delete_database {
                return Err(CatalogError::not_supported(format!(
                    "catalog {} does not allow deleting databases",
                    catalog.config.name
                )));
            }
            if catalog.store.get_database(name).await?.is_none() {
                return Err(CatalogError::not_found("database", name));
            }
            let tables = catalog.store.list_tables(name).await?;
            if !tables.is_empty() {
                return Err(CatalogError::retryable_conflict(format!(
                    "database {name} still has {} table(s)",
                    tables.len()
                )));
            }

            catalog.store.delete_database(name).await?;
            self.user_metadata
                .delete_definition_metadata(std::slice::from_ref(name))
                .await?;
            tracing::info!(request_id = %ctx.request_id, actor = %ctx.actor, "Deleted database");
            Ok(())
        })
        .await
    }

    async fn load_database(
        &self,
        catalog: &RegisteredCatalog,
        name: &QualifiedName,
    ) -> Result<DatabaseDto> {
        let mut database = catalog
            .store
            .get_database(name)
            .await?
            .ok_or_else(|| CatalogError::not_found("database", name))?;
        database.tables = catalog.store.list_tables(name).await?;
        database.definition_metadata = self.definition_of(name).await?;
        Ok(database)
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Creates a table.
    ///
    /// # Errors
    ///
    /// Returns `NotSupported` if the catalog disallows table creation,
    /// `BadRequest` for invalid fields, `NotFound` if the database does not
    /// exist, and `AlreadyExists` if the table exists.
    pub async fn create_table(&self, ctx: &RequestContext, table: TableDto) -> Result<TableDto> {
        let name = table.name.clone();
        observe("create_table", &name, async {
            name.require(NameType::Table)?;
            let catalog = self.registered(&name)?;
            if !catalog.config.capabilities.can_create_table {
                return Err(CatalogError::not_supported(format!(
                    "catalog {} does not allow creating tables",
                    catalog.config.name
                )));
            }
            validate_fields(&table.fields)?;

            let database = name.ancestor(NameType::Database)?;
            if catalog.store.get_database(&database).await?.is_none() {
                return Err(CatalogError::not_found("database", &database));
            }
            if catalog.store.get_table(&name).await?.is_some() {
                return Err(CatalogError::already_exists("table", &name));
            }

            let fields = if catalog.config.capabilities.partition_keys_trail_in_field_order {
                relocate_partition_keys(table.fields.clone())
            } else {
                table.fields.clone()
            };
            let stored = TableDto {
                name: name.clone(),
                fields,
                storage_info: table.storage_info.clone(),
                definition_metadata: None,
                data_metadata: None,
                audit: Some(AuditInfo::created(&ctx.actor, self.clock.now())),
            };
            catalog.store.create_table(&stored).await?;

            self.merge_definition(&name, table.definition_metadata.as_ref())
                .await?;
            if let (Some(uri), false) = (
                stored.storage_info.uri.as_ref(),
                merge::is_empty(table.data_metadata.as_ref()),
            ) {
                self.merge_data(uri, table.data_metadata.as_ref(), false)
                    .await?;
            }

            tracing::info!(
                request_id = %ctx.request_id,
                actor = %ctx.actor,
                partition_keys = ?stored.partition_keys(),
                "Created table"
            );
            self.load_table(catalog, &name, true).await
        })
        .await
    }

    /// Gets a table with its user metadata.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the catalog or table does not exist.
    pub async fn get_table(&self, name: &QualifiedName) -> Result<TableDto> {
        observe("get_table", name, async {
            name.require(NameType::Table)?;
            let catalog = self.registered(name)?;
            self.load_table(catalog, name, true).await
        })
        .await
    }

    /// Updates a table's storage info and merges its metadata.
    ///
    /// Fields cannot be changed; an empty field list means "unchanged".
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist and `BadRequest` if
    /// the field list differs from the stored one.
    pub async fn update_table(&self, ctx: &RequestContext, table: TableDto) -> Result<TableDto> {
        let name = table.name.clone();
        observe("update_table", &name, async {
            name.require(NameType::Table)?;
            let catalog = self.registered(&name)?;
            let existing = self.load_table(catalog, &name, true).await?;

            if !table.fields.is_empty() {
                let incoming = if catalog.config.capabilities.partition_keys_trail_in_field_order
                {
                    relocate_partition_keys(table.fields.clone())
                } else {
                    table.fields.clone()
                };
                if incoming != existing.fields {
                    return Err(CatalogError::bad_request(format!(
                        "fields of table {name} cannot be changed"
                    )));
                }
            }

            let storage_info = table.storage_info.inherit_from(&existing.storage_info);
            let uri_changed = storage_info.uri != existing.storage_info.uri;
            let definition = merge::merge(
                existing.definition_metadata.as_ref(),
                table.definition_metadata.as_ref(),
            );
            let data = merge_data_metadata(
                existing.data_metadata.as_ref(),
                table.data_metadata.as_ref(),
                uri_changed,
            );

            if storage_info == existing.storage_info
                && definition == existing.definition_metadata
                && data == existing.data_metadata
            {
                tracing::debug!("Table unchanged");
                return Ok(existing);
            }

            let stored = TableDto {
                storage_info,
                definition_metadata: None,
                data_metadata: None,
                audit: Some(touch(existing.audit.as_ref(), &ctx.actor, self.clock.now())),
                ..existing.clone()
            };
            catalog.store.update_table(&stored).await?;

            let definition_keys =
                merge::diff_keys(existing.definition_metadata.as_ref(), definition.as_ref());
            if let Some(doc) = definition.filter(|d| existing.definition_metadata.as_ref() != Some(d)) {
                self.user_metadata
                    .save_definition_metadata(vec![(name.clone(), doc)])
                    .await?;
            }
            match (stored.storage_info.uri.clone(), data) {
                (Some(uri), Some(doc)) => {
                    self.user_metadata
                        .save_data_metadata(vec![(uri, doc)])
                        .await?;
                }
                // Whatever sits at the new location belongs to an earlier occupant.
                (Some(uri), None) if uri_changed => {
                    self.user_metadata.delete_data_metadata(&[uri]).await?;
                }
                _ => {}
            }

            tracing::info!(
                request_id = %ctx.request_id,
                actor = %ctx.actor,
                uri_changed,
                definition_keys = ?definition_keys,
                "Updated table"
            );
            self.load_table(catalog, &name, true).await
        })
        .await
    }

    /// Deletes a table, its partitions, and the definition metadata of both.
    ///
    /// Data metadata is keyed by location and outlives the table.
    ///
    /// # Errors
    ///
    /// Returns `NotSupported` if the catalog disallows table deletion and
    /// `NotFound` if the table does not exist.
    pub async fn delete_table(&self, ctx: &RequestContext, name: &QualifiedName) -> Result<()> {
        observe("delete_table", name, async {
            name.require(NameType::Table)?;
            let catalog = self.registered(name)?;
            if !catalog.config.capabilities.can_delete_table {
                return Err(CatalogError::not_supported(format!(
                    "catalog {} does not allow deleting tables",
                    catalog.config.name
                )));
            }
            let table = self.load_table(catalog, name, false).await?;
            let partitions = catalog.store.list_partitions(&table.name, None).await?;

            catalog.store.delete_table(name).await?;

            let mut names: Vec<QualifiedName> =
                partitions.iter().map(|p| p.name.clone()).collect();
            names.push(name.clone());
            self.user_metadata.delete_definition_metadata(&names).await?;

            metrics::record_partitions_deleted(&catalog.config.name, partitions.len());
            tracing::info!(
                request_id = %ctx.request_id,
                actor = %ctx.actor,
                partitions = partitions.len(),
                "Deleted table"
            );
            Ok(())
        })
        .await
    }

    async fn load_table(
        &self,
        catalog: &RegisteredCatalog,
        name: &QualifiedName,
        include_user_metadata: bool,
    ) -> Result<TableDto> {
        let mut table = catalog
            .store
            .get_table(name)
            .await?
            .ok_or_else(|| CatalogError::not_found("table", name))?;
        if include_user_metadata {
            table.definition_metadata = self.definition_of(name).await?;
            if let Some(uri) = table.storage_info.uri.clone() {
                table.data_metadata = self
                    .user_metadata
                    .get_data_metadata(&[uri.clone()])
                    .await?
                    .remove(&uri);
            }
        }
        Ok(table)
    }

    // ========================================================================
    // Partitions
    // ========================================================================

    /// Lists partition names (`k=v/...`) selected by `request`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist and `BadRequest` for
    /// an invalid filter or sort key.
    pub async fn get_partition_keys(
        &self,
        name: &QualifiedName,
        request: &GetPartitionsRequest,
    ) -> Result<Vec<String>> {
        observe("get_partition_keys", name, async {
            let request = GetPartitionsRequest {
                include_user_metadata: false,
                ..request.clone()
            };
            let partitions = self.select_partitions(name, &request).await?;
            Ok::<_, CatalogError>(partitions
                .iter()
                .map(|p| p.partition_name().to_string())
                .collect())
        })
        .await
    }

    /// Lists partitions selected by `request`.
    ///
    /// The filter is parsed and type-checked once. Catalogs that support
    /// predicate pushdown receive it; otherwise it is evaluated here against
    /// each partition's decoded key values. Sorting and paging apply after
    /// filtering.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist and `BadRequest` for
    /// an invalid filter or sort key.
    pub async fn get_partitions(
        &self,
        name: &QualifiedName,
        request: &GetPartitionsRequest,
    ) -> Result<Vec<PartitionDto>> {
        observe("get_partitions", name, self.select_partitions(name, request)).await
    }

    /// Counts the partitions of a table.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist.
    pub async fn get_partition_count(&self, name: &QualifiedName) -> Result<usize> {
        observe("get_partition_count", name, async {
            name.require(NameType::Table)?;
            let catalog = self.registered(name)?;
            self.load_table(catalog, name, false).await?;
            Ok::<_, CatalogError>(catalog.store.partition_count(name).await?)
        })
        .await
    }

    async fn select_partitions(
        &self,
        name: &QualifiedName,
        request: &GetPartitionsRequest,
    ) -> Result<Vec<PartitionDto>> {
        name.require(NameType::Table)?;
        let catalog = self.registered(name)?;
        let table = self.load_table(catalog, name, false).await?;

        let filter = match request.filter.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => PartitionFilter::compile(
                text,
                table.partition_key_fields(),
                &catalog.config.filter_options(),
            )?,
            _ => PartitionFilter::match_all(table.partition_key_fields()),
        };
        if let Some(Sort {
            by: SortBy::Key(key),
            ..
        }) = &request.sort
        {
            if !table
                .partition_keys()
                .iter()
                .any(|k| k.eq_ignore_ascii_case(key))
            {
                return Err(CatalogError::bad_request(format!(
                    "cannot sort by '{key}': not a partition key of {name}"
                )));
            }
        }

        let mut partitions = if let Some(names) = &request.partition_names {
            let keys = table.partition_keys();
            let names: Vec<String> = names
                .iter()
                .map(|n| canonical_partition_name(&keys, n).unwrap_or_else(|_| n.clone()))
                .collect();
            let selected = catalog.store.get_partitions_by_names(name, &names).await?;
            filter_in_process(&filter, selected)
        } else if filter.is_match_all() {
            catalog.store.list_partitions(name, None).await?
        } else if catalog.config.capabilities.supports_predicate_pushdown {
            metrics::record_filter_evaluation(FilterMode::Pushdown);
            catalog.store.list_partitions(name, Some(&filter)).await?
        } else {
            let all = catalog.store.list_partitions(name, None).await?;
            filter_in_process(&filter, all)
        };

        sort_partitions(&mut partitions, request.sort.as_ref(), &filter);
        let mut partitions = match &request.page {
            Some(page) => page.apply(partitions),
            None => partitions,
        };
        if request.include_user_metadata {
            self.attach_partition_metadata(&mut partitions).await?;
        }

        tracing::debug!(
            filter = %filter.source(),
            returned = partitions.len(),
            "Selected partitions"
        );
        Ok(partitions)
    }

    /// Saves a batch of partitions.
    ///
    /// Each partition is classified as added, updated, or unchanged; only
    /// the first two are written, in a single backend call that also
    /// applies `partition_names_to_delete`. Resubmitting an identical batch
    /// writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist, `BadRequest` for
    /// invalid partition names or values (nothing is written), and
    /// `AlreadyExists` if `alter_if_exists` is off and a partition differs
    /// from its stored version.
    pub async fn save_partitions(
        &self,
        ctx: &RequestContext,
        name: &QualifiedName,
        request: SavePartitionsRequest,
    ) -> Result<SavePartitionsResponse> {
        observe("save_partitions", name, async {
            let started = Instant::now();
            name.require(NameType::Table)?;
            let catalog = self.registered(name)?;
            let table = self.load_table(catalog, name, false).await?;

            let partitions = canonicalize_batch(&table, &request.partitions)?;
            let keys = table.partition_keys();
            let to_delete = request
                .partition_names_to_delete
                .iter()
                .map(|deleted| canonical_partition_name(&keys, deleted))
                .collect::<Result<Vec<_>>>()?;

            let names: Vec<String> = partitions
                .iter()
                .map(|p| p.partition_name().to_string())
                .collect();
            let mut stored = catalog.store.get_partitions_by_names(name, &names).await?;
            self.attach_partition_metadata(&mut stored).await?;
            let current: HashMap<String, PartitionDto> = stored
                .into_iter()
                .map(|p| (p.partition_name().to_string(), p))
                .collect();

            let reconciliation = reconcile(
                &table,
                &partitions,
                &current,
                &ReconcileContext {
                    now: self.clock.now(),
                    actor: &ctx.actor,
                    alter_if_exists: request.alter_if_exists,
                },
            )?;

            let saved: BTreeSet<&str> = names.iter().map(String::as_str).collect();
            let deleted: Vec<String> = catalog
                .store
                .get_partitions_by_names(name, &to_delete)
                .await?
                .into_iter()
                .map(|p| p.partition_name().to_string())
                .filter(|n| !saved.contains(n.as_str()))
                .collect();

            let batch = PartitionBatch {
                added: reconciliation.to_add.iter().map(without_user_metadata).collect(),
                updated: reconciliation.to_update.iter().map(without_user_metadata).collect(),
                deleted: deleted.clone(),
            };
            if !batch.is_empty() {
                catalog.store.save_partitions(name, batch).await?;
            }

            self.persist_partition_metadata(&reconciliation.to_add, &reconciliation.to_update, &current)
                .await?;
            if !deleted.is_empty() {
                let deleted_names = deleted
                    .iter()
                    .map(|d| name.with_partition(d))
                    .collect::<metacat_core::Result<Vec<_>>>()?;
                self.user_metadata
                    .delete_definition_metadata(&deleted_names)
                    .await?;
            }
            self.merge_definition(name, request.definition_metadata.as_ref())
                .await?;

            metrics::record_save_partitions(
                &catalog.config.name,
                reconciliation.added.len(),
                reconciliation.updated.len(),
                reconciliation.unchanged.len(),
                deleted.len(),
                started.elapsed().as_secs_f64(),
            );
            tracing::info!(
                request_id = %ctx.request_id,
                actor = %ctx.actor,
                added = reconciliation.added.len(),
                updated = reconciliation.updated.len(),
                unchanged = reconciliation.unchanged.len(),
                deleted = deleted.len(),
                "Saved partitions"
            );

            Ok::<_, CatalogError>(SavePartitionsResponse {
                added: reconciliation.added.into_iter().collect(),
                updated: reconciliation.updated.into_iter().collect(),
            })
        })
        .await
    }

    /// Deletes partitions by name and their definition metadata.
    ///
    /// Unknown names are ignored. Returns the names actually deleted.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist and `BadRequest` for
    /// names that are malformed or do not carry the table's partition keys.
    pub async fn delete_partitions(
        &self,
        ctx: &RequestContext,
        name: &QualifiedName,
        partition_names: &[String],
    ) -> Result<Vec<String>> {
        observe("delete_partitions", name, async {
            name.require(NameType::Table)?;
            let catalog = self.registered(name)?;
            let table = self.load_table(catalog, name, false).await?;
            let keys = table.partition_keys();
            let partition_names = partition_names
                .iter()
                .map(|partition| canonical_partition_name(&keys, partition))
                .collect::<Result<Vec<_>>>()?;

            let existing: Vec<String> = catalog
                .store
                .get_partitions_by_names(name, &partition_names)
                .await?
                .into_iter()
                .map(|p| p.partition_name().to_string())
                .collect();
            if existing.is_empty() {
                return Ok(existing);
            }

            let batch = PartitionBatch {
                deleted: existing.clone(),
                ..PartitionBatch::default()
            };
            catalog.store.save_partitions(name, batch).await?;
            let qualified = existing
                .iter()
                .map(|p| name.with_partition(p))
                .collect::<metacat_core::Result<Vec<_>>>()?;
            self.user_metadata
                .delete_definition_metadata(&qualified)
                .await?;

            metrics::record_partitions_deleted(&catalog.config.name, existing.len());
            tracing::info!(
                request_id = %ctx.request_id,
                actor = %ctx.actor,
                deleted = existing.len(),
                "Deleted partitions"
            );
            Ok::<_, CatalogError>(existing)
        })
        .await
    }

    // ========================================================================
    // User metadata
    // ========================================================================

    async fn definition_of(&self, name: &QualifiedName) -> Result<Option<MetadataDoc>> {
        Ok(self
            .user_metadata
            .get_definition_metadata(std::slice::from_ref(name))
            .await?
            .remove(name))
    }

    /// Merges `incoming` into the stored definition metadata of `name`.
    /// Returns true if the stored document changed.
    async fn merge_definition(
        &self,
        name: &QualifiedName,
        incoming: Option<&MetadataDoc>,
    ) -> Result<bool> {
        if merge::is_empty(incoming) {
            return Ok(false);
        }
        let existing = self.definition_of(name).await?;
        match merge::merge(existing.as_ref(), incoming) {
            Some(merged) if existing.as_ref() != Some(&merged) => {
                tracing::debug!(
                    name = %name,
                    keys = ?merge::diff_keys(existing.as_ref(), Some(&merged)),
                    "Merged definition metadata"
                );
                self.user_metadata
                    .save_definition_metadata(vec![(name.clone(), merged)])
                    .await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn merge_data(
        &self,
        uri: &str,
        incoming: Option<&MetadataDoc>,
        uri_changed: bool,
    ) -> Result<()> {
        let uri = uri.to_string();
        let existing = self
            .user_metadata
            .get_data_metadata(std::slice::from_ref(&uri))
            .await?
            .remove(&uri);
        if let Some(merged) = merge_data_metadata(existing.as_ref(), incoming, uri_changed) {
            self.user_metadata
                .save_data_metadata(vec![(uri, merged)])
                .await?;
        }
        Ok(())
    }

    async fn attach_partition_metadata(&self, partitions: &mut [PartitionDto]) -> Result<()> {
        if partitions.is_empty() {
            return Ok(());
        }
        let names: Vec<QualifiedName> = partitions.iter().map(|p| p.name.clone()).collect();
        let uris: Vec<String> = partitions
            .iter()
            .filter_map(|p| p.storage_info.uri.clone())
            .collect();
        let mut definitions = self.user_metadata.get_definition_metadata(&names).await?;
        let data = self.user_metadata.get_data_metadata(&uris).await?;
        for partition in partitions {
            partition.definition_metadata = definitions.remove(&partition.name);
            partition.data_metadata = partition.uri().and_then(|uri| data.get(uri).cloned());
        }
        Ok(())
    }

    async fn persist_partition_metadata(
        &self,
        added: &[PartitionDto],
        updated: &[PartitionDto],
        current: &HashMap<String, PartitionDto>,
    ) -> Result<()> {
        let mut definitions = Vec::new();
        let mut data = Vec::new();
        let mut cleared = Vec::new();

        for partition in added.iter().chain(updated) {
            let previous = current.get(partition.partition_name());
            if let Some(doc) = &partition.definition_metadata {
                if previous.and_then(|p| p.definition_metadata.as_ref()) != Some(doc) {
                    definitions.push((partition.name.clone(), doc.clone()));
                }
            }
            let Some(uri) = partition.uri() else {
                continue;
            };
            match &partition.data_metadata {
                Some(doc) => data.push((uri.to_string(), doc.clone())),
                None if previous.is_some_and(|p| p.uri() != Some(uri)) => {
                    cleared.push(uri.to_string());
                }
                None => {}
            }
        }

        if !definitions.is_empty() {
            self.user_metadata.save_definition_metadata(definitions).await?;
        }
        if !data.is_empty() {
            self.user_metadata.save_data_metadata(data).await?;
        }
        if !cleared.is_empty() {
            self.user_metadata.delete_data_metadata(&cleared).await?;
        }
        Ok(())
    }
}

/// Runs one operation inside its span and records failures.
async fn observe<T>(
    operation: &'static str,
    name: &QualifiedName,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let span = catalog_span(operation, &name.to_string());
    let result = fut.instrument(span.clone()).await;
    if let Err(err) = &result {
        metrics::record_request_error(operation, err.kind());
        span.in_scope(|| {
            tracing::warn!(kind = err.kind(), error = %err, "Request rejected");
        });
    }
    result
}

fn touch(
    audit: Option<&AuditInfo>,
    actor: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> AuditInfo {
    audit.map_or_else(
        || AuditInfo::created(actor, now),
        |a| a.touched(actor, now),
    )
}

fn filter_in_process(filter: &PartitionFilter, partitions: Vec<PartitionDto>) -> Vec<PartitionDto> {
    if filter.is_match_all() {
        return partitions;
    }
    metrics::record_filter_evaluation(FilterMode::InProcess);
    partitions
        .into_iter()
        .filter(|p| filter.matches_name(p.partition_name()))
        .collect()
}

fn without_user_metadata(partition: &PartitionDto) -> PartitionDto {
    PartitionDto {
        definition_metadata: None,
        data_metadata: None,
        ..partition.clone()
    }
}

fn sort_partitions(partitions: &mut [PartitionDto], sort: Option<&Sort>, filter: &PartitionFilter) {
    let Some(sort) = sort else {
        partitions.sort_by(|a, b| a.partition_name().cmp(b.partition_name()));
        return;
    };
    match &sort.by {
        SortBy::Name => partitions.sort_by(|a, b| a.partition_name().cmp(b.partition_name())),
        SortBy::Key(key) => {
            let key = key.to_lowercase();
            partitions.sort_by_cached_key(|p| {
                let value = filter
                    .decode(p.partition_name())
                    .and_then(|mut values| values.remove(&key));
                SortKey(value, p.partition_name().to_string())
            });
        }
    }
    if sort.order == SortOrder::Descending {
        partitions.reverse();
    }
}

/// Typed key value with the partition name as tiebreak.
struct SortKey(Option<metacat_core::ScalarValue>, String);

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_value = match (&self.0, &other.0) {
            (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_value.then_with(|| self.1.cmp(&other.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogCapabilities;
    use crate::store::memory::{InMemoryMetadataStore, InMemoryUserMetadataStore};
    use metacat_core::{Field, FieldType, SystemClock};
    use serde_json::json;

    struct Harness {
        service: CatalogService,
        store: Arc<InMemoryMetadataStore>,
        table: QualifiedName,
    }

    async fn harness(capabilities: CatalogCapabilities) -> Harness {
        let store = Arc::new(InMemoryMetadataStore::new());
        let service = CatalogService::new(
            Arc::new(InMemoryUserMetadataStore::new()),
            Arc::new(SystemClock),
        )
        .with_catalog(
            CatalogConfig::with_capabilities("hive", capabilities),
            store.clone(),
        );
        let ctx = RequestContext::new("test");
        let db = QualifiedName::database("hive", "db").unwrap();
        service
            .create_database(&ctx, DatabaseDto::new(db.clone()).unwrap())
            .await
            .unwrap();
        let table = db.with_table("t").unwrap();
        let fields = vec![
            Field::partition_key("pk", FieldType::Int, 0),
            Field::new("v", FieldType::String, 1),
        ];
        service
            .create_table(&ctx, TableDto::new(table.clone(), fields).unwrap())
            .await
            .unwrap();
        Harness {
            service,
            store,
            table,
        }
    }

    /// Collects the `definition_keys` field of "Updated table" events.
    #[derive(Clone, Default)]
    struct UpdateLog(Arc<std::sync::Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for UpdateLog {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            #[derive(Default)]
            struct Fields {
                message: String,
                definition_keys: Option<String>,
            }

            impl tracing::field::Visit for Fields {
                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    match field.name() {
                        "message" => self.message = format!("{value:?}"),
                        "definition_keys" => self.definition_keys = Some(format!("{value:?}")),
                        _ => {}
                    }
                }
            }

            let mut fields = Fields::default();
            event.record(&mut fields);
            if let Some(keys) = fields
                .definition_keys
                .filter(|_| fields.message == "Updated table")
            {
                self.0.lock().unwrap().push(keys);
            }
        }
    }

    fn partition(table: &QualifiedName, pk: i32) -> PartitionDto {
        PartitionDto::new(table.with_partition(format!("pk={pk}")).unwrap())
            .unwrap()
            .with_uri(format!("s3://b/t/pk={pk}"))
    }

    #[tokio::test]
    async fn unregistered_catalog_is_not_found() {
        let h = harness(CatalogCapabilities::default()).await;
        let err = h
            .service
            .get_catalog(&QualifiedName::catalog("nope").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[tokio::test]
    async fn partition_keys_trail_when_configured() {
        let h = harness(CatalogCapabilities {
            partition_keys_trail_in_field_order: true,
            ..CatalogCapabilities::default()
        })
        .await;
        let table = h.service.get_table(&h.table).await.unwrap();
        let names: Vec<_> = table.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["v", "pk"]);
        assert_eq!(table.fields[1].position, 1);
    }

    #[tokio::test]
    async fn sort_by_key_is_typed_and_pages() {
        let h = harness(CatalogCapabilities::default()).await;
        let ctx = RequestContext::new("test");
        let batch = [2, 10, 1].iter().map(|pk| partition(&h.table, *pk)).collect();
        h.service
            .save_partitions(&ctx, &h.table, SavePartitionsRequest::new(batch))
            .await
            .unwrap();

        let by_name = h
            .service
            .get_partition_keys(&h.table, &GetPartitionsRequest::all())
            .await
            .unwrap();
        assert_eq!(by_name, vec!["pk=1", "pk=10", "pk=2"]);

        let by_key = h
            .service
            .get_partition_keys(
                &h.table,
                &GetPartitionsRequest::all()
                    .sorted_by(SortBy::Key("pk".into()), SortOrder::Descending)
                    .with_page(0, Some(2)),
            )
            .await
            .unwrap();
        assert_eq!(by_key, vec!["pk=10", "pk=2"]);
    }

    #[tokio::test]
    async fn sort_by_unknown_key_is_bad_request() {
        let h = harness(CatalogCapabilities::default()).await;
        let err = h
            .service
            .get_partitions(
                &h.table,
                &GetPartitionsRequest::all().sorted_by(SortBy::Key("v".into()), SortOrder::Ascending),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn update_table_rejects_field_changes_and_merges_metadata() {
        let h = harness(CatalogCapabilities::default()).await;
        let ctx = RequestContext::new("test");

        let mut changed = h.service.get_table(&h.table).await.unwrap();
        changed.fields.push(Field::new("extra", FieldType::Int, 2));
        let err = h.service.update_table(&ctx, changed).await.unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest { .. }));

        let first = TableDto::new(h.table.clone(), Vec::new())
            .unwrap()
            .with_definition_metadata(json!({"owner": "a"}));
        h.service.update_table(&ctx, first).await.unwrap();
        let second = TableDto::new(h.table.clone(), Vec::new())
            .unwrap()
            .with_definition_metadata(json!({"sla": 1}));
        let updated = h.service.update_table(&ctx, second).await.unwrap();
        assert_eq!(
            updated.definition_metadata,
            Some(json!({"owner": "a", "sla": 1}))
        );
    }

    #[tokio::test]
    async fn delete_partitions_ignores_unknown_names() {
        let h = harness(CatalogCapabilities::default()).await;
        let ctx = RequestContext::new("test");
        h.service
            .save_partitions(
                &ctx,
                &h.table,
                SavePartitionsRequest::new(vec![partition(&h.table, 1), partition(&h.table, 2)]),
            )
            .await
            .unwrap();

        let deleted = h
            .service
            .delete_partitions(&ctx, &h.table, &["pk=1".to_string(), "pk=99".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, vec!["pk=1"]);
        assert_eq!(h.service.get_partition_count(&h.table).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn table_update_logs_only_changed_definition_keys() {
        use tracing_subscriber::layer::SubscriberExt;

        let h = harness(CatalogCapabilities::default()).await;
        let ctx = RequestContext::new("test");
        let mut first = TableDto::new(h.table.clone(), Vec::new()).unwrap();
        first.definition_metadata = Some(json!({"owner": "a", "tier": 1}));
        h.service.update_table(&ctx, first).await.unwrap();

        let log = UpdateLog::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));
        let mut second = TableDto::new(h.table.clone(), Vec::new()).unwrap();
        second.definition_metadata = Some(json!({"tier": 2}));
        let updated = h.service.update_table(&ctx, second).await.unwrap();

        assert_eq!(
            updated.definition_metadata,
            Some(json!({"owner": "a", "tier": 2}))
        );
        assert_eq!(*log.0.lock().unwrap(), vec![r#"["tier"]"#.to_string()]);
    }

    #[tokio::test]
    async fn key_case_variants_address_the_same_partition() {
        let h = harness(CatalogCapabilities::default()).await;
        let ctx = RequestContext::new("test");
        h.service
            .save_partitions(
                &ctx,
                &h.table,
                SavePartitionsRequest::new(vec![partition(&h.table, 1)]),
            )
            .await
            .unwrap();
        let writes = h.store.write_count();

        let shouted = PartitionDto::new(h.table.with_partition("PK=1").unwrap())
            .unwrap()
            .with_uri("s3://b/t/pk=1");
        let response = h
            .service
            .save_partitions(&ctx, &h.table, SavePartitionsRequest::new(vec![shouted]))
            .await
            .unwrap();
        assert!(response.added.is_empty());
        assert!(response.updated.is_empty());
        assert_eq!(h.store.write_count(), writes);
        assert_eq!(h.service.get_partition_count(&h.table).await.unwrap(), 1);

        let deleted = h
            .service
            .delete_partitions(&ctx, &h.table, &["Pk=1".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, vec!["pk=1"]);

        let err = h
            .service
            .delete_partitions(&ctx, &h.table, &["other=1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn save_can_delete_in_same_batch() {
        let h = harness(CatalogCapabilities::default()).await;
        let ctx = RequestContext::new("test");
        h.service
            .save_partitions(
                &ctx,
                &h.table,
                SavePartitionsRequest::new(vec![partition(&h.table, 1)]),
            )
            .await
            .unwrap();
        let writes = h.store.write_count();

        let response = h
            .service
            .save_partitions(
                &ctx,
                &h.table,
                SavePartitionsRequest::new(vec![partition(&h.table, 2)]).deleting(["pk=1"]),
            )
            .await
            .unwrap();
        assert_eq!(response.added, vec!["pk=2"]);
        assert_eq!(h.store.write_count(), writes + 1);
        let keys = h
            .service
            .get_partition_keys(&h.table, &GetPartitionsRequest::all())
            .await
            .unwrap();
        assert_eq!(keys, vec!["pk=2"]);
    }

    #[tokio::test]
    async fn backend_unavailable_is_retryable_conflict() {
        let h = harness(CatalogCapabilities::default()).await;
        h.store
            .fail_next_write(crate::store::StoreError::Unavailable {
                message: "down".into(),
            })
            .unwrap();
        let err = h
            .service
            .save_partitions(
                &RequestContext::new("test"),
                &h.table,
                SavePartitionsRequest::new(vec![partition(&h.table, 1)]),
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}

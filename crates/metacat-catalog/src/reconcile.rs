//! Partition batch reconciliation.
//!
//! Given a batch of incoming partitions and the stored state of the same
//! names, decides per partition whether the save is an insert, an update,
//! or a no-op, and produces the documents to persist. Reconciliation is
//! pure: it performs no I/O and reads no clock.
//!
//! Identity of a stored partition is its name; its *physical* identity is
//! its location. The location decides how data metadata is combined (see
//! [`merge_data_metadata`](crate::merge::merge_data_metadata)).

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use metacat_core::{AuditInfo, NameType, PartitionDto, PartitionValues, TableDto};

use crate::error::{CatalogError, Result};
use crate::merge::{diff_keys, merge, merge_data_metadata};

/// Inputs of a reconciliation that do not come from the batch itself.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext<'a> {
    /// Instant stamped into audit records.
    pub now: DateTime<Utc>,
    /// Actor stamped into audit records.
    pub actor: &'a str,
    /// Whether changed existing partitions may be updated.
    pub alter_if_exists: bool,
}

/// Outcome of reconciling one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Names of partitions that did not exist.
    pub added: BTreeSet<String>,
    /// Names of existing partitions that changed.
    pub updated: BTreeSet<String>,
    /// Names of existing partitions submitted without changes.
    pub unchanged: BTreeSet<String>,
    /// Partitions to insert, metadata and audit filled in.
    pub to_add: Vec<PartitionDto>,
    /// Partitions to overwrite, metadata and audit filled in.
    pub to_update: Vec<PartitionDto>,
}

impl Reconciliation {
    /// Returns true if anything needs to be written.
    #[must_use]
    pub fn has_writes(&self) -> bool {
        !(self.to_add.is_empty() && self.to_update.is_empty())
    }

    /// Partitions to write, inserts first.
    pub fn writes(&self) -> impl Iterator<Item = &PartitionDto> {
        self.to_add.iter().chain(self.to_update.iter())
    }
}

/// Validates the partition names of a batch against `table` and returns
/// the batch under canonical names.
///
/// Every name must belong to `table`, decode cleanly, and carry exactly the
/// table's partition keys in declared order with non-empty, non-null
/// values. Keys are compared case-insensitively and respelled as declared,
/// so a name is identified by its values alone. Canonical names must be
/// unique within the batch.
///
/// # Errors
///
/// Returns [`CatalogError::BadRequest`] describing the first offending
/// partition.
pub fn canonicalize_batch(
    table: &TableDto,
    incoming: &[PartitionDto],
) -> Result<Vec<PartitionDto>> {
    let keys = table.partition_keys();
    if !incoming.is_empty() && keys.is_empty() {
        return Err(CatalogError::bad_request(format!(
            "table {} is not partitioned",
            table.name
        )));
    }

    let mut seen = HashSet::with_capacity(incoming.len());
    let mut canonical = Vec::with_capacity(incoming.len());
    for partition in incoming {
        let owner = partition.name.ancestor(NameType::Table)?;
        if partition.name.name_type() != NameType::Partition || owner != table.name {
            return Err(CatalogError::bad_request(format!(
                "partition {} does not belong to table {}",
                partition.name, table.name
            )));
        }
        let name = canonical_partition_name(&keys, partition.partition_name())?;
        if !seen.insert(name.clone()) {
            return Err(CatalogError::bad_request(format!(
                "partition {} appears more than once in the batch",
                partition.name
            )));
        }
        canonical.push(PartitionDto {
            name: table.name.with_partition(name)?,
            ..partition.clone()
        });
    }
    Ok(canonical)
}

/// Validates a bare partition name against declared `keys` and returns it
/// in canonical spelling.
///
/// # Errors
///
/// Returns [`CatalogError::BadRequest`] if the name does not decode or does
/// not carry exactly `keys`.
pub fn canonical_partition_name(keys: &[&str], name: &str) -> Result<String> {
    let values = PartitionValues::decode(name)?
        .canonicalize(keys)
        .map_err(|e| CatalogError::bad_request(format!("invalid partition {name}: {e}")))?;
    Ok(values.encode())
}

/// Reconciles `incoming` against `current`.
///
/// `current` maps partition names to the stored partitions (user metadata
/// attached) for the names in the batch; names absent from the map are
/// treated as new.
///
/// # Errors
///
/// Returns [`CatalogError::BadRequest`] if the batch fails
/// [`canonicalize_batch`], and [`CatalogError::AlreadyExists`] if
/// `alter_if_exists` is off and a submitted partition differs from its
/// stored version.
pub fn reconcile(
    table: &TableDto,
    incoming: &[PartitionDto],
    current: &HashMap<String, PartitionDto>,
    ctx: &ReconcileContext<'_>,
) -> Result<Reconciliation> {
    let incoming = canonicalize_batch(table, incoming)?;

    let mut result = Reconciliation::default();
    for partition in &incoming {
        let name = partition.partition_name().to_string();
        match current.get(&name) {
            None => {
                tracing::debug!(partition = %name, "Partition is new");
                result.added.insert(name);
                result.to_add.push(added(partition, ctx));
            }
            Some(existing) => match changed(existing, partition, ctx) {
                None => {
                    tracing::debug!(partition = %name, "Partition unchanged");
                    result.unchanged.insert(name);
                }
                Some(_) if !ctx.alter_if_exists => {
                    return Err(CatalogError::already_exists("partition", &partition.name));
                }
                Some(updated) => {
                    tracing::debug!(
                        partition = %name,
                        definition_keys = ?diff_keys(
                            existing.definition_metadata.as_ref(),
                            updated.definition_metadata.as_ref(),
                        ),
                        "Partition updated"
                    );
                    result.updated.insert(name);
                    result.to_update.push(updated);
                }
            },
        }
    }
    Ok(result)
}

fn added(incoming: &PartitionDto, ctx: &ReconcileContext<'_>) -> PartitionDto {
    PartitionDto {
        name: incoming.name.clone(),
        storage_info: incoming.storage_info.clone(),
        definition_metadata: merge(None, incoming.definition_metadata.as_ref()),
        data_metadata: merge(None, incoming.data_metadata.as_ref()),
        audit: Some(AuditInfo::created(ctx.actor, ctx.now)),
        data_external: incoming.data_external,
    }
}

/// Returns the partition to persist, or `None` if nothing differs.
fn changed(
    existing: &PartitionDto,
    incoming: &PartitionDto,
    ctx: &ReconcileContext<'_>,
) -> Option<PartitionDto> {
    let storage_info = incoming.storage_info.inherit_from(&existing.storage_info);
    let uri_changed = storage_info.uri != existing.storage_info.uri;
    let definition_metadata = merge(
        existing.definition_metadata.as_ref(),
        incoming.definition_metadata.as_ref(),
    );
    let data_metadata = merge_data_metadata(
        existing.data_metadata.as_ref(),
        incoming.data_metadata.as_ref(),
        uri_changed,
    );

    let unchanged = !uri_changed
        && storage_info == existing.storage_info
        && definition_metadata == existing.definition_metadata
        && data_metadata == existing.data_metadata
        && incoming.data_external == existing.data_external;
    if unchanged {
        return None;
    }

    let audit = existing.audit.as_ref().map_or_else(
        || AuditInfo::created(ctx.actor, ctx.now),
        |audit| audit.touched(ctx.actor, ctx.now),
    );
    Some(PartitionDto {
        name: existing.name.clone(),
        storage_info,
        definition_metadata,
        data_metadata,
        audit: Some(audit),
        data_external: incoming.data_external,
    })
}

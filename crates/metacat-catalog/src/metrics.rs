//! Catalog metrics.
//!
//! Counters and histograms for partition saves, filter evaluation, and
//! request failures. These complement the structured logging emitted by
//! [`CatalogService`](crate::service::CatalogService).

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Partition Metrics
// ============================================================================

/// Partitions inserted by saves.
pub const PARTITIONS_ADDED: &str = "metacat_partitions_added_total";

/// Existing partitions changed by saves.
pub const PARTITIONS_UPDATED: &str = "metacat_partitions_updated_total";

/// Partitions submitted without changes.
pub const PARTITIONS_UNCHANGED: &str = "metacat_partitions_unchanged_total";

/// Partitions removed.
pub const PARTITIONS_DELETED: &str = "metacat_partitions_deleted_total";

/// Save-partitions duration histogram.
pub const SAVE_PARTITIONS_DURATION: &str = "metacat_save_partitions_duration_seconds";

// ============================================================================
// Filter Metrics
// ============================================================================

/// Filtered partition listings, labelled by `mode`.
pub const FILTER_EVALUATIONS: &str = "metacat_filter_evaluations_total";

// ============================================================================
// Error Metrics
// ============================================================================

/// Failed requests, labelled by error `kind`.
pub const REQUEST_ERRORS: &str = "metacat_request_errors_total";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all catalog metric descriptions.
///
/// Call this once at application startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_counter!(PARTITIONS_ADDED, "Total partitions inserted");
    describe_counter!(PARTITIONS_UPDATED, "Total existing partitions updated");
    describe_counter!(PARTITIONS_UNCHANGED, "Total partitions saved without changes");
    describe_counter!(PARTITIONS_DELETED, "Total partitions deleted");
    describe_histogram!(
        SAVE_PARTITIONS_DURATION,
        "Duration of save-partitions requests in seconds"
    );
    describe_counter!(
        FILTER_EVALUATIONS,
        "Total filtered partition listings by evaluation mode"
    );
    describe_counter!(REQUEST_ERRORS, "Total failed catalog requests by error kind");
}

// ============================================================================
// Metric Recording
// ============================================================================

/// Where a partition filter was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Handed to the backend store.
    Pushdown,
    /// Evaluated by the catalog service.
    InProcess,
}

impl FilterMode {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pushdown => "pushdown",
            Self::InProcess => "in_process",
        }
    }
}

/// Records the outcome of a partition save.
pub fn record_save_partitions(
    catalog: &str,
    added: usize,
    updated: usize,
    unchanged: usize,
    deleted: usize,
    duration_secs: f64,
) {
    let labels = [("catalog", catalog.to_string())];

    counter!(PARTITIONS_ADDED, &labels).increment(added as u64);
    counter!(PARTITIONS_UPDATED, &labels).increment(updated as u64);
    counter!(PARTITIONS_UNCHANGED, &labels).increment(unchanged as u64);
    counter!(PARTITIONS_DELETED, &labels).increment(deleted as u64);
    histogram!(SAVE_PARTITIONS_DURATION, &labels).record(duration_secs);
}

/// Records partitions removed outside a save.
pub fn record_partitions_deleted(catalog: &str, deleted: usize) {
    counter!(PARTITIONS_DELETED, "catalog" => catalog.to_string()).increment(deleted as u64);
}

/// Records a filtered partition listing.
pub fn record_filter_evaluation(mode: FilterMode) {
    counter!(FILTER_EVALUATIONS, "mode" => mode.as_str()).increment(1);
}

/// Records a failed request.
pub fn record_request_error(operation: &str, kind: &'static str) {
    counter!(REQUEST_ERRORS, "operation" => operation.to_string(), "kind" => kind).increment(1);
}

//! Request and response types for partition operations.

use serde::{Deserialize, Serialize};

use metacat_core::{MetadataDoc, PartitionDto};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Sort key for partition listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Partition name, byte-wise.
    #[default]
    Name,
    /// A partition key, typed by its declared type.
    Key(String),
}

/// Ordering of a partition listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// What to sort by.
    #[serde(default)]
    pub by: SortBy,
    /// Direction.
    #[serde(default)]
    pub order: SortOrder,
}

/// Offset/limit window over a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    /// Entries to skip.
    #[serde(default)]
    pub offset: usize,
    /// Maximum entries to return; `None` for all.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Pageable {
    /// Applies the window to a listing.
    #[must_use]
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let taken = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => taken.take(limit).collect(),
            None => taken.collect(),
        }
    }
}

/// Selection of partitions of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetPartitionsRequest {
    /// Filter expression over partition keys.
    pub filter: Option<String>,
    /// Explicit partition names (`k=v/...`) to select.
    pub partition_names: Option<Vec<String>>,
    /// Ordering; partition-name ascending when absent.
    pub sort: Option<Sort>,
    /// Window over the sorted result.
    pub page: Option<Pageable>,
    /// Attach definition and data metadata to returned partitions.
    pub include_user_metadata: bool,
}

impl GetPartitionsRequest {
    /// Selects every partition.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Selects partitions matching `filter`.
    #[must_use]
    pub fn filtered(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }

    /// Restricts to the named partitions.
    #[must_use]
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn sorted_by(mut self, by: SortBy, order: SortOrder) -> Self {
        self.sort = Some(Sort { by, order });
        self
    }

    /// Sets the window.
    #[must_use]
    pub fn with_page(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.page = Some(Pageable { offset, limit });
        self
    }

    /// Requests user metadata on returned partitions.
    #[must_use]
    pub fn with_user_metadata(mut self) -> Self {
        self.include_user_metadata = true;
        self
    }
}

/// A batch save of partitions of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePartitionsRequest {
    /// Table-scoped definition metadata, merged into the table's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_metadata: Option<MetadataDoc>,
    /// Partitions to insert or update.
    #[serde(default)]
    pub partitions: Vec<PartitionDto>,
    /// Partition names (`k=v/...`) to delete in the same batch.
    #[serde(default)]
    pub partition_names_to_delete: Vec<String>,
    /// Update partitions that exist and differ; otherwise fail.
    #[serde(default = "default_alter_if_exists")]
    pub alter_if_exists: bool,
}

const fn default_alter_if_exists() -> bool {
    true
}

impl Default for SavePartitionsRequest {
    fn default() -> Self {
        Self {
            definition_metadata: None,
            partitions: Vec::new(),
            partition_names_to_delete: Vec::new(),
            alter_if_exists: true,
        }
    }
}

impl SavePartitionsRequest {
    /// Saves the given partitions.
    #[must_use]
    pub fn new(partitions: Vec<PartitionDto>) -> Self {
        Self {
            partitions,
            ..Self::default()
        }
    }

    /// Sets table-scoped definition metadata.
    #[must_use]
    pub fn with_definition_metadata(mut self, doc: MetadataDoc) -> Self {
        self.definition_metadata = Some(doc);
        self
    }

    /// Deletes the named partitions in the same batch.
    #[must_use]
    pub fn deleting<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_names_to_delete = names.into_iter().map(Into::into).collect();
        self
    }

    /// Fails instead of updating partitions that exist and differ.
    #[must_use]
    pub fn without_alter(mut self) -> Self {
        self.alter_if_exists = false;
        self
    }
}

/// Outcome of a partition save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePartitionsResponse {
    /// Names of inserted partitions.
    pub added: Vec<String>,
    /// Names of updated partitions.
    pub updated: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        let items: Vec<u32> = (0..10).collect();
        let page = Pageable {
            offset: 3,
            limit: Some(4),
        };
        assert_eq!(page.apply(items.clone()), vec![3, 4, 5, 6]);
        assert_eq!(Pageable::default().apply(items.clone()).len(), 10);
        let past_end = Pageable {
            offset: 20,
            limit: None,
        };
        assert!(past_end.apply(items).is_empty());
    }

    #[test]
    fn test_save_request_defaults_to_alter() {
        let request: SavePartitionsRequest = serde_json::from_str("{}").unwrap();
        assert!(request.alter_if_exists);
        assert!(SavePartitionsRequest::default().alter_if_exists);
        assert!(!SavePartitionsRequest::default().without_alter().alter_if_exists);
    }

    #[test]
    fn test_get_request_json_shape() {
        let request = GetPartitionsRequest::filtered("pk2 > 1")
            .sorted_by(SortBy::Key("pk2".into()), SortOrder::Descending)
            .with_page(0, Some(5));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["filter"], "pk2 > 1");
        assert_eq!(json["sort"]["by"]["key"], "pk2");
        assert_eq!(json["sort"]["order"], "descending");
        assert_eq!(json["includeUserMetadata"], false);
    }
}

//! Physical storage descriptors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where and how an entity's data is physically stored.
///
/// `uri` is the physical identity of a partition: a partition whose `uri`
/// changes is treated as relocated, even if its name is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    /// Data location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Input format identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_format: Option<String>,
    /// Output format identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    /// Serialization library identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialization_lib: Option<String>,
    /// Free-form storage parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl StorageInfo {
    /// Storage info with just a location.
    #[must_use]
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Sets the input/output formats and serialization library.
    #[must_use]
    pub fn with_formats(
        mut self,
        input_format: impl Into<String>,
        output_format: impl Into<String>,
        serialization_lib: impl Into<String>,
    ) -> Self {
        self.input_format = Some(input_format.into());
        self.output_format = Some(output_format.into());
        self.serialization_lib = Some(serialization_lib.into());
        self
    }

    /// Adds a storage parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Fills every unspecified field from `existing`.
    ///
    /// `None` fields and an empty parameter map mean "not specified" and
    /// inherit the stored value; anything specified wins.
    #[must_use]
    pub fn inherit_from(&self, existing: &Self) -> Self {
        Self {
            uri: self.uri.clone().or_else(|| existing.uri.clone()),
            input_format: self
                .input_format
                .clone()
                .or_else(|| existing.input_format.clone()),
            output_format: self
                .output_format
                .clone()
                .or_else(|| existing.output_format.clone()),
            serialization_lib: self
                .serialization_lib
                .clone()
                .or_else(|| existing.serialization_lib.clone()),
            parameters: if self.parameters.is_empty() {
                existing.parameters.clone()
            } else {
                self.parameters.clone()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherit_fills_only_unspecified() {
        let existing = StorageInfo::with_uri("s3://b/old")
            .with_formats("in", "out", "serde")
            .with_parameter("k", "v");
        let incoming = StorageInfo::with_uri("s3://b/new");

        let effective = incoming.inherit_from(&existing);
        assert_eq!(effective.uri.as_deref(), Some("s3://b/new"));
        assert_eq!(effective.input_format.as_deref(), Some("in"));
        assert_eq!(effective.serialization_lib.as_deref(), Some("serde"));
        assert_eq!(effective.parameters.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_inherit_replaces_specified_parameters() {
        let existing = StorageInfo::default().with_parameter("a", "1");
        let incoming = StorageInfo::default().with_parameter("b", "2");
        let effective = incoming.inherit_from(&existing);
        assert!(!effective.parameters.contains_key("a"));
        assert_eq!(effective.parameters.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_empty_storage_serializes_as_empty_object() {
        let json = serde_json::to_string(&StorageInfo::default()).unwrap();
        assert_eq!(json, "{}");
    }
}

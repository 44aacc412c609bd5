//! Metadata document merging.
//!
//! Definition metadata is merged key-wise on every save: incoming keys
//! overwrite, nested objects recurse, and keys only present in the stored
//! document survive. Omitting a document (or sending `null` or `{}`) never
//! erases what is stored.
//!
//! Data metadata follows the same rule while a partition stays at the same
//! location. When the location changes the stored document describes data
//! that is no longer there, so the incoming document replaces it wholesale.

use serde_json::{Map, Value};

use metacat_core::MetadataDoc;

/// Returns true if `doc` carries nothing to merge: absent, `null`, or `{}`.
#[must_use]
pub fn is_empty(doc: Option<&MetadataDoc>) -> bool {
    match doc {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Deep-merges `incoming` over `existing`.
///
/// - incoming empty (absent, `null`, `{}`): `existing` unchanged
/// - existing absent: `incoming`
/// - both objects: key-wise, recursing into nested objects
/// - otherwise: `incoming` replaces `existing`
#[must_use]
pub fn merge(existing: Option<&MetadataDoc>, incoming: Option<&MetadataDoc>) -> Option<MetadataDoc> {
    if is_empty(incoming) {
        return existing.cloned();
    }
    let incoming = incoming?;
    match existing {
        None | Some(Value::Null) => Some(incoming.clone()),
        Some(existing) => {
            let mut merged = existing.clone();
            merge_into(&mut merged, incoming);
            Some(merged)
        }
    }
}

/// Merges data metadata, honoring the partition's physical identity.
///
/// With an unchanged location this is [`merge`]. With a changed location
/// the result is `incoming` as given, and absent or empty input clears the
/// document.
#[must_use]
pub fn merge_data_metadata(
    existing: Option<&MetadataDoc>,
    incoming: Option<&MetadataDoc>,
    uri_changed: bool,
) -> Option<MetadataDoc> {
    if uri_changed {
        if is_empty(incoming) {
            None
        } else {
            incoming.cloned()
        }
    } else {
        merge(existing, incoming)
    }
}

fn merge_into(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => merge_objects(target, patch),
        (target, patch) => *target = patch.clone(),
    }
}

fn merge_objects(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        let recurse = value.is_object() && target.get(key).is_some_and(Value::is_object);
        match target.get_mut(key) {
            Some(existing) if recurse => merge_into(existing, value),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Top-level keys whose values differ between two documents.
///
/// Used for logging what a save changed. Non-object documents report the
/// pseudo-key `$` when they differ.
#[must_use]
pub fn diff_keys(before: Option<&MetadataDoc>, after: Option<&MetadataDoc>) -> Vec<String> {
    let empty = Map::new();
    let (Some(before_map), Some(after_map)) = (as_object(before, &empty), as_object(after, &empty))
    else {
        return if before == after {
            Vec::new()
        } else {
            vec!["$".to_string()]
        };
    };

    let mut keys: Vec<String> = after_map
        .iter()
        .filter(|(k, v)| before_map.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect();
    keys.extend(
        before_map
            .keys()
            .filter(|k| !after_map.contains_key(*k))
            .cloned(),
    );
    keys
}

fn as_object<'a>(
    doc: Option<&'a MetadataDoc>,
    empty: &'a Map<String, Value>,
) -> Option<&'a Map<String, Value>> {
    match doc {
        None | Some(Value::Null) => Some(empty),
        Some(Value::Object(map)) => Some(map),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disjoint_keys_union() {
        let merged = merge(Some(&json!({"y": 2})), Some(&json!({"x": 1}))).unwrap();
        assert_eq!(merged, json!({"y": 2, "x": 1}));
    }

    #[test]
    fn test_incoming_overwrites_and_recurses() {
        let existing = json!({"owner": {"team": "a", "email": "a@x"}, "tags": [1, 2]});
        let incoming = json!({"owner": {"team": "b"}, "tags": [3]});
        let merged = merge(Some(&existing), Some(&incoming)).unwrap();
        assert_eq!(
            merged,
            json!({"owner": {"team": "b", "email": "a@x"}, "tags": [3]})
        );
    }

    #[test]
    fn test_empty_incoming_preserves_existing() {
        let existing = json!({"a": 1});
        assert_eq!(merge(Some(&existing), None), Some(existing.clone()));
        assert_eq!(merge(Some(&existing), Some(&Value::Null)), Some(existing.clone()));
        assert_eq!(merge(Some(&existing), Some(&json!({}))), Some(existing.clone()));
        assert_eq!(merge(None, Some(&json!({}))), None);
    }

    #[test]
    fn test_absent_existing_takes_incoming() {
        assert_eq!(merge(None, Some(&json!({"a": 1}))), Some(json!({"a": 1})));
    }

    #[test]
    fn test_null_values_inside_documents_overwrite() {
        let merged = merge(Some(&json!({"a": 1})), Some(&json!({"a": null}))).unwrap();
        assert_eq!(merged, json!({"a": null}));
    }

    #[test]
    fn test_merge_preserves_key_order() {
        let merged = merge(Some(&json!({"z": 1, "a": 2})), Some(&json!({"m": 3}))).unwrap();
        let keys: Vec<_> = merged.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_data_metadata_same_location_merges() {
        let merged = merge_data_metadata(Some(&json!({"y": 2})), Some(&json!({"x": 1})), false);
        assert_eq!(merged, Some(json!({"y": 2, "x": 1})));
    }

    #[test]
    fn test_data_metadata_new_location_replaces() {
        let merged = merge_data_metadata(Some(&json!({"y": 2})), Some(&json!({"x": 1})), true);
        assert_eq!(merged, Some(json!({"x": 1})));
        assert_eq!(merge_data_metadata(Some(&json!({"y": 2})), None, true), None);
    }

    #[test]
    fn test_diff_keys() {
        let before = json!({"a": 1, "b": 2, "c": 3});
        let after = json!({"a": 1, "b": 5, "d": 4});
        let mut keys = diff_keys(Some(&before), Some(&after));
        keys.sort();
        assert_eq!(keys, vec!["b", "c", "d"]);
        assert!(diff_keys(Some(&before), Some(&before)).is_empty());
        assert_eq!(diff_keys(None, Some(&json!({"a": 1}))), vec!["a"]);
        assert_eq!(diff_keys(Some(&json!([1])), Some(&json!([2]))), vec!["$"]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn flat_doc() -> impl Strategy<Value = Value> {
            prop::collection::btree_map("[a-e]", any::<i32>(), 0..5).prop_map(|m| {
                Value::Object(m.into_iter().map(|(k, v)| (k, json!(v))).collect())
            })
        }

        proptest! {
            #[test]
            fn merged_contains_every_incoming_key(existing in flat_doc(), incoming in flat_doc()) {
                let merged = merge(Some(&existing), Some(&incoming)).unwrap();
                for (k, v) in incoming.as_object().unwrap() {
                    prop_assert_eq!(merged.get(k), Some(v));
                }
                for (k, v) in existing.as_object().unwrap() {
                    if !incoming.as_object().unwrap().contains_key(k) {
                        prop_assert_eq!(merged.get(k), Some(v));
                    }
                }
            }

            #[test]
            fn merge_is_idempotent(existing in flat_doc(), incoming in flat_doc()) {
                let once = merge(Some(&existing), Some(&incoming));
                let twice = merge(once.as_ref(), Some(&incoming));
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn omission_preserves(existing in flat_doc()) {
                prop_assert_eq!(merge(Some(&existing), None), Some(existing.clone()));
            }
        }
    }
}

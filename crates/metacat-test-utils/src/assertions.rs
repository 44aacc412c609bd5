//! Custom assertion helpers for integration tests.

use metacat_catalog::CatalogError;
use metacat_core::PartitionDto;

/// Asserts that a result failed with [`CatalogError::NotFound`].
///
/// # Panics
///
/// Panics if the result succeeded or failed with another kind.
pub fn assert_not_found<T: std::fmt::Debug>(result: &Result<T, CatalogError>) {
    assert_error_kind(result, "not_found");
}

/// Asserts that a result failed with [`CatalogError::AlreadyExists`].
///
/// # Panics
///
/// Panics if the result succeeded or failed with another kind.
pub fn assert_already_exists<T: std::fmt::Debug>(result: &Result<T, CatalogError>) {
    assert_error_kind(result, "already_exists");
}

/// Asserts that a result failed with [`CatalogError::BadRequest`].
///
/// # Panics
///
/// Panics if the result succeeded or failed with another kind.
pub fn assert_bad_request<T: std::fmt::Debug>(result: &Result<T, CatalogError>) {
    assert_error_kind(result, "bad_request");
}

/// Asserts that a result failed with [`CatalogError::NotSupported`].
///
/// # Panics
///
/// Panics if the result succeeded or failed with another kind.
pub fn assert_not_supported<T: std::fmt::Debug>(result: &Result<T, CatalogError>) {
    assert_error_kind(result, "not_supported");
}

/// Asserts that a result failed with a retryable [`CatalogError::Conflict`].
///
/// # Panics
///
/// Panics if the result succeeded, failed with another kind, or the
/// conflict is not retryable.
pub fn assert_retryable_conflict<T: std::fmt::Debug>(result: &Result<T, CatalogError>) {
    assert_error_kind(result, "conflict");
    if let Err(err) = result {
        assert!(err.is_retryable(), "Expected retryable conflict, got {err}");
    }
}

/// Asserts that a result failed with the given error kind.
///
/// # Panics
///
/// Panics if the result succeeded or failed with another kind.
pub fn assert_error_kind<T: std::fmt::Debug>(result: &Result<T, CatalogError>, kind: &str) {
    match result {
        Ok(value) => panic!("Expected {kind} error, but got Ok({value:?})"),
        Err(err) => assert_eq!(
            err.kind(),
            kind,
            "Expected {kind} error, but got {}: {err}",
            err.kind()
        ),
    }
}

/// Asserts that two name lists hold the same names, ignoring order.
///
/// # Panics
///
/// Panics if the lists differ.
pub fn assert_same_names<S: AsRef<str>>(actual: &[String], expected: &[S]) {
    let mut actual: Vec<&str> = actual.iter().map(String::as_str).collect();
    let mut expected: Vec<&str> = expected.iter().map(AsRef::as_ref).collect();
    actual.sort_unstable();
    expected.sort_unstable();
    assert_eq!(actual, expected, "Partition names differ");
}

/// Asserts that every partition has a created audit record.
///
/// # Panics
///
/// Panics if a partition has no audit record.
pub fn assert_audited(partitions: &[PartitionDto]) {
    for partition in partitions {
        assert!(
            partition.audit.is_some(),
            "Partition {} has no audit record",
            partition.name
        );
    }
}

//! Error types for metacat-catalog operations.
//!
//! [`CatalogError`] is the request-facing taxonomy. Local validation
//! failures (names, partition values, filter syntax) become `BadRequest`
//! before any backend call; backend failures are translated from
//! [`StoreError`] to the nearest kind, and anything without a clear mapping
//! surfaces as `Internal`.

use thiserror::Error;

use crate::filter::FilterError;
use crate::store::StoreError;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Referenced catalog, database, table, or partition does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// Create requested for an entity that exists.
    #[error("already exists: {message}")]
    AlreadyExists {
        /// Description of the conflicting entity.
        message: String,
    },

    /// Operation disallowed by the catalog's capability flags.
    #[error("not supported: {message}")]
    NotSupported {
        /// Description of the disallowed operation.
        message: String,
    },

    /// Malformed request: names, partition values, or filter.
    #[error("bad request: {message}")]
    BadRequest {
        /// Description of the problem.
        message: String,
    },

    /// Integrity violation reported by the catalog or its backend.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
        /// Whether the caller may retry.
        retryable: bool,
    },

    /// Unexpected failure with no clear mapping.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl CatalogError {
    /// Creates a not-found error for a named entity.
    #[must_use]
    pub fn not_found(entity: &str, name: impl std::fmt::Display) -> Self {
        Self::NotFound {
            message: format!("{entity} {name} does not exist"),
        }
    }

    /// Creates an already-exists error for a named entity.
    #[must_use]
    pub fn already_exists(entity: &str, name: impl std::fmt::Display) -> Self {
        Self::AlreadyExists {
            message: format!("{entity} {name} already exists"),
        }
    }

    /// Creates a not-supported error.
    #[must_use]
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Creates a bad-request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a retryable conflict error.
    #[must_use]
    pub fn retryable_conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the caller may retry the request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { retryable: true, .. })
    }

    /// Returns a stable error code for logs and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotSupported { .. } => "not_supported",
            Self::BadRequest { .. } => "bad_request",
            Self::Conflict { .. } => "conflict",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<metacat_core::Error> for CatalogError {
    fn from(err: metacat_core::Error) -> Self {
        match err {
            metacat_core::Error::Serialization { message } => Self::Internal { message },
            other => Self::BadRequest {
                message: other.to_string(),
            },
        }
    }
}

impl From<metacat_core::PartitionNameError> for CatalogError {
    fn from(err: metacat_core::PartitionNameError) -> Self {
        Self::BadRequest {
            message: format!("invalid partition name: {err}"),
        }
    }
}

impl From<FilterError> for CatalogError {
    fn from(err: FilterError) -> Self {
        Self::BadRequest {
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { message } => Self::NotFound { message },
            StoreError::AlreadyExists { message } => Self::AlreadyExists { message },
            StoreError::IntegrityViolation { message } | StoreError::Unavailable { message } => {
                Self::Conflict {
                    message,
                    retryable: true,
                }
            }
            StoreError::Other { message, .. } => Self::Internal { message },
        }
    }
}

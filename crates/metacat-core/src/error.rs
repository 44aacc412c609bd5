//! Error types and result aliases for metacat.
//!
//! This module defines the shared error type used by the core primitives.
//! Catalog-level errors (the request-facing taxonomy) live in `metacat-catalog`
//! and convert from this type.

use std::fmt;

use crate::partition::PartitionNameError;

/// The result type used throughout metacat-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core metacat operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A qualified name was malformed.
    #[error("invalid name: {message}")]
    InvalidName {
        /// Description of what made the name invalid.
        message: String,
    },

    /// A partition name failed to parse or validate.
    #[error("invalid partition name: {0}")]
    PartitionName(#[from] PartitionNameError),

    /// A field list violated a schema invariant.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the violated invariant.
        message: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Creates a new invalid-name error.
    #[must_use]
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName {
            message: message.into(),
        }
    }

    /// Creates a new invalid-schema error.
    #[must_use]
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a serialization error from any displayable cause.
    #[must_use]
    pub fn serialization(cause: impl fmt::Display) -> Self {
        Self::Serialization {
            message: cause.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

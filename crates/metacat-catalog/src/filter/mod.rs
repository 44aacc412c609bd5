//! Partition filter expressions.
//!
//! A filter is a small boolean language over partition keys:
//!
//! ```text
//! pk1 = "even" AND (pk2 BETWEEN 5 AND 8 OR pk3 <> 1)
//! ```
//!
//! Filters are parsed once per request. [`parse`] produces an untyped
//! [`Predicate`]; [`PartitionFilter::compile`] additionally resolves every
//! key against the table's declared partition keys and converts literals to
//! the key's type, so unknown keys and type mismatches are rejected before
//! any backend is consulted. The compiled filter is then either handed to a
//! store that supports predicate pushdown or evaluated in-process against
//! each partition's decoded key values.
//!
//! String values must be double-quoted. Whether a bare word on the
//! right-hand side is an error or a string is governed by
//! [`BareWordPolicy`]; whether a quoted literal may be compared against a
//! numeric key is governed by [`TypePolicy`].

mod ast;
mod compiled;
mod lexer;
mod parser;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ast::{CompareOp, KeyValues, Literal, Predicate};
pub use compiled::PartitionFilter;
pub use parser::{MAX_COMPARISONS, MAX_NESTING_DEPTH, parse};

/// Errors produced while parsing or type-checking a filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The filter text is not well formed.
    #[error("filter syntax error at position {position}: {message}")]
    Syntax {
        /// Byte offset into the filter text.
        position: usize,
        /// What was wrong.
        message: String,
    },

    /// A literal cannot be compared with the declared type of its key.
    #[error("filter type mismatch on key '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Partition key.
        key: String,
        /// Declared type of the key.
        expected: String,
        /// Description of the offending literal.
        found: String,
    },

    /// The filter references a key that is not a partition key.
    #[error("filter references unknown partition key '{0}'")]
    UnknownKey(String),
}

impl FilterError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// Treatment of unquoted words where a literal is expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BareWordPolicy {
    /// `pk1=even` is a syntax error.
    #[default]
    Reject,
    /// `pk1=even` compares `pk1` with the string `"even"`.
    AsString,
}

/// Treatment of quoted literals compared against numeric keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypePolicy {
    /// Reject with [`FilterError::TypeMismatch`].
    Strict,
    /// Coerce the literal to a number; reject only if it does not parse.
    #[default]
    Lenient,
}

/// Per-catalog filter parsing and typing options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Bare-word handling.
    pub bare_words: BareWordPolicy,
    /// Literal typing.
    pub type_policy: TypePolicy,
}

impl FilterOptions {
    /// Strict typing, bare words rejected.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            bare_words: BareWordPolicy::Reject,
            type_policy: TypePolicy::Strict,
        }
    }
}

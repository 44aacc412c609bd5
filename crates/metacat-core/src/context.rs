//! Per-request context for catalog operations.
//!
//! Carries the actor recorded in audit trails and a request ID for log
//! correlation. This is the catalog-facing equivalent of HTTP request
//! context; authentication happens before a context is built.

use std::fmt;

use ulid::Ulid;

/// Actor recorded when a request does not name one.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// Strongly-typed request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a new request ID (ULID).
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Wraps an existing request ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context for one catalog request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Actor performing the request (service/user).
    pub actor: String,
    /// Request ID for tracing/correlation.
    pub request_id: RequestId,
}

impl RequestContext {
    /// Creates a context for the given actor with a fresh request ID.
    #[must_use]
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            request_id: RequestId::generate(),
        }
    }

    /// Sets a caller-supplied request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = RequestId::new(request_id);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(ANONYMOUS_ACTOR)
    }
}

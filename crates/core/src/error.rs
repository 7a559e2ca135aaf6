//! Domain error model.

use thiserror::Error;

use crate::id::BackendId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Only conditions that must abort an operation live here. Short transfers,
/// under-supply and under-capacity are not errors: they surface as smaller
/// counts in the returned outcomes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No usable transfer channel between the local actor and a backend.
    ///
    /// Fatal: continuing would treat units as moved when they were not.
    #[error("no transfer route between local actor and backend {backend}")]
    Routing { backend: BackendId },

    /// A backend adapter call failed.
    #[error("backend {backend} failed: {message}")]
    Backend { backend: BackendId, message: String },

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested resource was not found.
    #[error("not found")]
    NotFound,
}

impl DomainError {
    pub fn routing(backend: BackendId) -> Self {
        Self::Routing { backend }
    }

    pub fn backend(backend: BackendId, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether this error aborts the enclosing allocator operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Routing { .. } | Self::Backend { .. })
    }
}

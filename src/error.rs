//! Typed error taxonomy for the document store and session channel.
//!
//! Store operations return `StoreError` and never raise through to the
//! transport layer unhandled: the session channel translates every variant
//! into a `{success: false, message}` response for the specific caller.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the document store and the operations layered on it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Project, asset, or file absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal name, or an unknown variant tag with no structural fallback match.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Malformed JSON, or a field that fails numeric coercion.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Disk / filesystem failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-side bound exceeded.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Reserved for future optimistic versioning. The last-writer-wins
    /// design never produces it, but it must be representable.
    #[error("concurrent modification: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl StoreError {
    /// True if the error indicates the target simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

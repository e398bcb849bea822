//! # Cache Error Types
//!
//! Errors for cache persistence. Note the asymmetry with the rest of the
//! system: the in-memory cache itself has no error conditions (absent keys
//! are `None`, not errors), so everything here concerns the durable mirror.
//! Per the propagation policy, these are logged and swallowed at the flush
//! site — persistence failure must never block or fail a mutation.

use thiserror::Error;

/// Result type alias for cache persistence operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache persistence errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Snapshot could not be serialized or deserialized.
    #[error("Snapshot serialization failed: {0}")]
    Serialization(String),

    /// The durable key-value store rejected the operation
    /// (unavailable, quota exceeded, ...).
    #[error("Snapshot store failed: {0}")]
    Store(String),

    /// File-backed store I/O failure.
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

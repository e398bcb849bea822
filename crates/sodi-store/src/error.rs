//! # Store Error Types
//!
//! Errors for remote store gateway operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Backend failure (sqlx::Error / transport)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ClientError (sodi-client) ← Triggers rollback, then propagates        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UI layer displays the failure notification                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Remote store gateway errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found in the collection.
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// A record with this id already exists in the collection.
    #[error("Duplicate id '{id}' in collection '{collection}'")]
    Duplicate { collection: String, id: String },

    /// The store rejected the record fields (constraint violation).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An attempt to persist a pending (optimistic) id.
    ///
    /// Pending ids exist only inside the cache between an optimistic write
    /// and its reconciliation; a store must never see one.
    #[error("Refusing to persist pending id '{id}'")]
    PendingId { id: String },

    /// Connection to the backing store failed.
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Record fields could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Creates a NotFound error with context.
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// True if the failure is a missing record rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StoreError::not_found("sales", "s1");
        assert_eq!(err.to_string(), "sales/s1 not found");
        assert!(err.is_not_found());
        assert!(!StoreError::Validation("x".into()).is_not_found());
    }
}

//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key read by the transaction changed before it committed.
    #[error("concurrent modification of {0}")]
    Conflict(String),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Malformed key or stored row.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid key: {0}")]
    InvalidKey(#[from] docstack_types::Error),
}

impl StorageError {
    /// Conflicts are the only failures a caller should retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

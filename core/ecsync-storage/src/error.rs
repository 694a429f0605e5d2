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

    /// A persisted row could not be turned back into a component.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The connection lock was poisoned by a panicking writer.
    #[error("lock error: {0}")]
    Lock(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

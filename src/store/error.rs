//! Error types for the conversation store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced conversation does not exist.
    #[error("conversation not found")]
    NotFound,

    /// Conversation id already in use.
    #[error("conversation id already exists: {0}")]
    DuplicateKey(String),

    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

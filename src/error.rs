//! Error types for the memory engine.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    /// The embedding provider was unreachable or returned a malformed vector.
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Only raised by direct single-entry lookups; update and delete paths
    /// treat a missing id as a no-op.
    #[error("memory not found: {0}")]
    NotFound(i64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    /// Whether the orchestrator may reasonably retry the failed call.
    pub fn is_retryable(&self) -> bool {
        match self {
            MemoryError::Embedding(_) => true,
            MemoryError::Storage(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

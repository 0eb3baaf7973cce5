use thiserror::Error;
use uuid::Uuid;

/// Blob volume and chunk-session errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Chunk {index} is missing from the session")]
    MissingChunk { index: u32 },

    #[error("Invalid blob name: {0}")]
    InvalidName(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

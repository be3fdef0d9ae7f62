//! Storage error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid blob uri: {0}")]
    InvalidUri(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("transient storage error: {0}")]
    Transient(String),

    #[error("backend not configured: {0}")]
    NotConfigured(String),

    #[error("storage error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialize(e.to_string())
    }
}

impl From<object_store::Error> for StorageError {
    fn from(e: object_store::Error) -> Self {
        match e {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::Other(other.to_string()),
        }
    }
}

//! Engine error taxonomy.
//!
//! `Config` and `Validation` are fatal to the invocation and surface
//! to the broker so the message dead-letters. `Retryable` drives the
//! lag offload. Everything else finalizes the run as FAILED in the
//! same call that sees it.

use std::time::Duration;

use thiserror::Error;

use fitglue_queue::QueueError;
use fitglue_storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("provider {provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("retryable: {reason}")]
    Retryable {
        reason: String,
        retry_after: Option<Duration>,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("operation cancelled")]
    Cancelled,
}

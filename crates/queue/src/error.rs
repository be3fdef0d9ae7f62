//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("envelope parse error: {0}")]
    Parse(String),

    #[error("payload decode error: {0}")]
    Decode(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("topic not found: {0}")]
    NotFound(String),
}

//! Push sender trait and shared error types.

use std::collections::HashMap;
use std::sync::Arc;

/// Errors that can occur during push delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push rejected: {0}")]
    Rejected(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// A rendered push notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Deep-link payload (e.g. pipeline run id, pending input id).
    pub data: HashMap<String, String>,
}

/// Trait for push-notification backends.
#[async_trait::async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver to every device token. Partial token failures are the
    /// implementation's concern; an error here means total failure.
    async fn send(&self, tokens: &[String], message: &PushMessage) -> Result<(), NotifyError>;
}

#[async_trait::async_trait]
impl<T: PushSender + ?Sized> PushSender for Arc<T> {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> Result<(), NotifyError> {
        (**self).send(tokens, message).await
    }
}

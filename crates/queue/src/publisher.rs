//! Publisher gateway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::QueueError;

/// Enqueue a message with optional attributes to a named logical
/// topic. Returns the broker's opaque message id.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        data: &[u8],
        attributes: &HashMap<String, String>,
    ) -> Result<String, QueueError>;
}

#[async_trait]
impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    async fn publish(
        &self,
        topic: &str,
        data: &[u8],
        attributes: &HashMap<String, String>,
    ) -> Result<String, QueueError> {
        (**self).publish(topic, data, attributes).await
    }
}

/// One captured publish.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub message_id: String,
}

/// Capturing publisher for tests and local development.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured messages, in publish order.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.messages.lock().await.clone()
    }

    /// Captured messages on one topic.
    pub async fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(
        &self,
        topic: &str,
        data: &[u8],
        attributes: &HashMap<String, String>,
    ) -> Result<String, QueueError> {
        let message_id = Uuid::new_v4().to_string();
        tracing::debug!(topic, message_id = %message_id, bytes = data.len(), "captured publish");
        self.messages.lock().await.push(PublishedMessage {
            topic: topic.to_string(),
            data: data.to_vec(),
            attributes: attributes.clone(),
            message_id: message_id.clone(),
        });
        Ok(message_id)
    }
}

//! FCM push delivery over HTTP.

use serde_json::json;
use tracing::{debug, warn};

use crate::traits::{NotifyError, PushMessage, PushSender};

/// Sends pushes through the FCM HTTP endpoint.
pub struct FcmSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmSender {
    pub fn new(endpoint: impl Into<String>, server_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            server_key: server_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl PushSender for FcmSender {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> Result<(), NotifyError> {
        if tokens.is_empty() {
            debug!("no device tokens, skipping push");
            return Ok(());
        }

        let mut delivered = 0usize;
        for token in tokens {
            let body = json!({
                "to": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
            });

            let response = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("key={}", self.server_key))
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                delivered += 1;
            } else {
                // Stale tokens are expected; log and keep going.
                warn!(
                    status = %response.status(),
                    "FCM rejected push for one token"
                );
            }
        }

        if delivered == 0 {
            return Err(NotifyError::Rejected(format!(
                "all {} tokens rejected",
                tokens.len()
            )));
        }
        debug!(delivered, total = tokens.len(), "push delivered");
        Ok(())
    }
}

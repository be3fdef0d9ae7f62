//! Inbound message envelope framing.
//!
//! The broker delivers push bodies shaped like
//! `{"message": {"data": "<base64>", "attributes": {...},
//! "messageId": "...", "publishTime": "..."}, "subscription": "..."}`.
//! The envelope's `publish_time` is authoritative for lag detection;
//! the `origin=lag-queue` attribute marks messages already routed
//! through the slow lane.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fitglue_core::ActivityPayload;

use crate::error::QueueError;

/// Reserved attribute naming the queue a message was routed through.
pub const ATTR_ORIGIN: &str = "origin";

/// Attribute value tagging messages republished onto the lag topic.
pub const ORIGIN_LAG_QUEUE: &str = "lag-queue";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvelopeMessage {
    /// Base64-encoded payload bytes.
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default, alias = "messageId")]
    pub message_id: String,
    #[serde(default, alias = "publishTime")]
    pub publish_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(default)]
    pub message: EnvelopeMessage,
    #[serde(default)]
    pub subscription: String,
}

impl PushEnvelope {
    pub fn from_json(body: &[u8]) -> Result<Self, QueueError> {
        serde_json::from_slice(body).map_err(|e| QueueError::Parse(e.to_string()))
    }

    /// Decode the base64 `data` field into raw payload bytes.
    pub fn decode_data(&self) -> Result<Vec<u8>, QueueError> {
        BASE64
            .decode(self.message.data.as_bytes())
            .map_err(|e| QueueError::Decode(format!("invalid base64 data: {e}")))
    }

    /// Decode the data as an [`ActivityPayload`].
    pub fn decode_payload(&self) -> Result<ActivityPayload, QueueError> {
        let bytes = self.decode_data()?;
        serde_json::from_slice(&bytes).map_err(|e| {
            QueueError::Decode(format!(
                "invalid payload in message {}: {e}",
                self.message.message_id
            ))
        })
    }

    /// Whether this message already came through the lag queue.
    pub fn is_lag_origin(&self) -> bool {
        self.message
            .attributes
            .get(ATTR_ORIGIN)
            .is_some_and(|v| v == ORIGIN_LAG_QUEUE)
    }

    /// Test/helper constructor wrapping raw payload bytes.
    pub fn wrap(
        data: &[u8],
        attributes: HashMap<String, String>,
        publish_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            message: EnvelopeMessage {
                data: BASE64.encode(data),
                attributes,
                message_id: uuid::Uuid::new_v4().to_string(),
                publish_time,
            },
            subscription: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_push_body_with_camel_case_keys() {
        let body = br#"{
            "message": {
                "data": "eyJwaXBlbGluZV9pZCI6ICJwMSJ9",
                "attributes": {"origin": "lag-queue"},
                "messageId": "m-1",
                "publishTime": "2025-06-01T06:00:00Z"
            },
            "subscription": "projects/x/subscriptions/enrich"
        }"#;
        let env = PushEnvelope::from_json(body).unwrap();
        assert_eq!(env.message.message_id, "m-1");
        assert!(env.is_lag_origin());
        assert_eq!(env.decode_data().unwrap(), br#"{"pipeline_id": "p1"}"#);
    }

    #[test]
    fn decode_payload_tolerates_both_casings() {
        let payload = br#"{"userId": "u1", "pipeline_id": "p1"}"#;
        let env = PushEnvelope::wrap(payload, HashMap::new(), None);
        let decoded = env.decode_payload().unwrap();
        assert_eq!(decoded.user_id, "u1");
        assert_eq!(decoded.pipeline_id, "p1");
    }

    #[test]
    fn missing_attributes_mean_not_lag_origin() {
        let env = PushEnvelope::wrap(b"{}", HashMap::new(), None);
        assert!(!env.is_lag_origin());
    }

    #[test]
    fn garbage_base64_is_a_decode_error() {
        let mut env = PushEnvelope::wrap(b"{}", HashMap::new(), None);
        env.message.data = "!!not-base64!!".into();
        assert!(matches!(env.decode_data(), Err(QueueError::Decode(_))));
    }
}

//! Capturing push sender for tests.

use tokio::sync::Mutex;

use crate::traits::{NotifyError, PushMessage, PushSender};

/// One captured send.
#[derive(Debug, Clone)]
pub struct SentPush {
    pub tokens: Vec<String>,
    pub message: PushMessage,
}

/// Records every send instead of delivering.
#[derive(Default)]
pub struct MemorySender {
    sent: Mutex<Vec<SentPush>>,
    fail: bool,
}

impl MemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every send fails, for best-effort call sites.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait::async_trait]
impl PushSender for MemorySender {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Rejected("simulated failure".into()));
        }
        self.sent.lock().await.push(SentPush {
            tokens: tokens.to_vec(),
            message: message.clone(),
        });
        Ok(())
    }
}

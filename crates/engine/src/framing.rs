//! Process-entry-point framing.
//!
//! Owns two decisions the orchestrator does not: stale envelopes force
//! degraded enrichment (`do_not_retry`), and retryable lag converts
//! into a one-time republish onto the slow lane instead of hot-looping
//! the primary subscription. A message already tagged
//! `origin=lag-queue` surfaces the retry error so the broker's
//! subscription policy applies.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fitglue_core::Clock;
use fitglue_queue::{topics, Publisher, PushEnvelope, ATTR_ORIGIN, ORIGIN_LAG_QUEUE};

use crate::error::EngineError;
use crate::orchestrator::{Orchestrator, ProcessResult, ProcessStatus};

/// What the broker adapter should do with the message.
#[derive(Debug)]
pub enum HandleOutcome {
    /// ACK; enrichment ran (or skipped / suspended) normally.
    Processed(ProcessResult),
    /// ACK; the raw payload was republished onto the lag topic.
    Lagged,
}

pub struct EnrichmentHandler {
    orchestrator: Arc<Orchestrator>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    lag_threshold: Duration,
}

impl EnrichmentHandler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
        lag_threshold_minutes: u64,
    ) -> Self {
        Self {
            orchestrator,
            publisher,
            clock,
            lag_threshold: Duration::minutes(lag_threshold_minutes as i64),
        }
    }

    pub async fn handle(
        &self,
        envelope: &PushEnvelope,
        cancel: &CancellationToken,
    ) -> Result<HandleOutcome, EngineError> {
        let payload = envelope
            .decode_payload()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let do_not_retry = match envelope.message.publish_time {
            Some(published) => self.clock.now() - published > self.lag_threshold,
            None => false,
        };
        if do_not_retry {
            info!(
                message_id = %envelope.message.message_id,
                "stale envelope, forcing partial enrichment"
            );
        }

        let result = self
            .orchestrator
            .process(payload, None, None, do_not_retry, cancel)
            .await?;

        if result.status == ProcessStatus::LaggedRetry {
            let retry = result.retry.as_ref();
            if envelope.is_lag_origin() {
                // Already in the slow lane: let the broker's retry
                // policy pace redelivery.
                return Err(EngineError::Retryable {
                    reason: retry
                        .map(|r| r.reason.clone())
                        .unwrap_or_else(|| "provider retry".into()),
                    retry_after: retry.and_then(|r| r.retry_after),
                });
            }

            let raw = envelope.decode_data()?;
            let mut attributes = HashMap::new();
            attributes.insert(ATTR_ORIGIN.to_string(), ORIGIN_LAG_QUEUE.to_string());
            self.publisher
                .publish(topics::ENRICHMENT_LAG, &raw, &attributes)
                .await?;
            info!(
                message_id = %envelope.message.message_id,
                reason = retry.map(|r| r.reason.as_str()).unwrap_or_default(),
                "offloaded to lag queue"
            );
            return Ok(HandleOutcome::Lagged);
        }

        Ok(HandleOutcome::Processed(result))
    }
}

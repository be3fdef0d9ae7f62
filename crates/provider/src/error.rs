//! Provider outcome classification.
//!
//! `Retryable` and `WaitForInput` are control flow, not failures: the
//! orchestrator routes them into the lag queue and the pending-input
//! suspension respectively. Only `Failed` is a real error.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// What a provider needs from the user before it can finish.
#[derive(Debug, Clone, Default)]
pub struct WaitForInputRequest {
    /// Activity identifier the provider keys its input on (usually the
    /// source external id).
    pub activity_id: String,
    /// Field names the user must supply, in display order.
    pub required_fields: Vec<String>,
    /// Display hints (`display.summary`, `display.field_labels`) plus
    /// provider context needed on resume.
    pub metadata: HashMap<String, String>,
    /// The provider's registered name.
    pub enricher_provider_id: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream data not ready yet; try again later.
    #[error("upstream data not ready: {reason}")]
    Retryable {
        reason: String,
        retry_after: Option<Duration>,
    },

    /// User interaction required; the run suspends.
    #[error("waiting for user input for {}", .0.enricher_provider_id)]
    WaitForInput(Box<WaitForInputRequest>),

    /// Anything else. Fails the run.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ProviderError {
    pub fn retryable(reason: impl Into<String>, retry_after: Option<Duration>) -> Self {
        ProviderError::Retryable {
            reason: reason.into(),
            retry_after,
        }
    }

    pub fn wait_for_input(request: WaitForInputRequest) -> Self {
        ProviderError::WaitForInput(Box::new(request))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ProviderError::Failed(anyhow::anyhow!(message.into()))
    }
}

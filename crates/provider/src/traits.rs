//! The enricher provider contract.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fitglue_core::{EnrichmentResult, PendingInput, ProviderType, StandardizedActivity, UserRecord};
use fitglue_storage::BlobStore;

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// Runtime handles a provider may need (showcase asset uploads etc).
/// Bound once at registry construction.
#[derive(Clone)]
pub struct ProviderServices {
    pub blob: Arc<dyn BlobStore>,
}

/// Per-call context.
#[derive(Clone)]
pub struct EnrichContext {
    /// Caller-supplied cancellation; providers must return promptly
    /// once cancelled.
    pub cancel: CancellationToken,
    /// Set when the envelope is stale: skip retryable work and degrade
    /// gracefully rather than signalling a retry.
    pub do_not_retry: bool,
}

impl EnrichContext {
    pub fn new(cancel: CancellationToken, do_not_retry: bool) -> Self {
        Self {
            cancel,
            do_not_retry,
        }
    }
}

impl Default for EnrichContext {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            do_not_retry: false,
        }
    }
}

/// A pluggable enrichment step.
///
/// `name`, `provider_type` and `enrich` are mandatory; the remaining
/// methods are optional capabilities with inert defaults.
#[async_trait]
pub trait EnricherProvider: Send + Sync {
    /// Stable registered name (e.g. `parkrun-results`). Also the
    /// pending-input key component and resume-list entry.
    fn name(&self) -> &str;

    fn provider_type(&self) -> ProviderType;

    async fn enrich(
        &self,
        ctx: &EnrichContext,
        activity: &StandardizedActivity,
        user: &UserRecord,
        config: &ProviderConfig,
    ) -> Result<EnrichmentResult, ProviderError>;

    /// Deferrable capability: whether this provider may opt into
    /// Phase 2 at all.
    fn deferrable(&self) -> bool {
        false
    }

    /// Whether to defer for this specific activity. Only consulted
    /// when [`deferrable`](Self::deferrable) is true.
    fn should_defer(&self, _activity: &StandardizedActivity) -> bool {
        false
    }

    /// Resumable capability.
    fn supports_resume(&self) -> bool {
        false
    }

    /// Re-entry with resolved user input. Only called when
    /// [`supports_resume`](Self::supports_resume) is true and the
    /// pending input completed.
    async fn enrich_resume(
        &self,
        _ctx: &EnrichContext,
        _activity: &StandardizedActivity,
        _user: &UserRecord,
        _pending_input: &PendingInput,
    ) -> Result<EnrichmentResult, ProviderError> {
        Err(ProviderError::failed(format!(
            "provider {} does not support resume",
            self.name()
        )))
    }

    /// Service-injection capability; called once at registry build.
    fn bind_services(&self, _services: &ProviderServices) {}
}

//! Configurable mock provider.
//!
//! Used by the engine test suites and wired into dev registries so a
//! pipeline can be exercised end to end without external services.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use fitglue_core::{EnrichmentResult, PendingInput, ProviderType, StandardizedActivity, UserRecord};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, WaitForInputRequest};
use crate::traits::{EnrichContext, EnricherProvider};

type EnrichFn = dyn Fn(&StandardizedActivity, &UserRecord, &ProviderConfig) -> Result<EnrichmentResult, ProviderError>
    + Send
    + Sync;

type ResumeFn = dyn Fn(&StandardizedActivity, &UserRecord, &PendingInput) -> Result<EnrichmentResult, ProviderError>
    + Send
    + Sync;

/// One observed dispatch.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub resumed: bool,
    pub do_not_retry: bool,
    pub config: Vec<(String, String)>,
}

pub struct MockProvider {
    name: String,
    provider_type: ProviderType,
    deferrable: bool,
    defer_this: bool,
    on_enrich: Box<EnrichFn>,
    on_resume: Option<Box<ResumeFn>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockProvider {
    pub fn new(
        name: impl Into<String>,
        provider_type: ProviderType,
        on_enrich: impl Fn(&StandardizedActivity, &UserRecord, &ProviderConfig) -> Result<EnrichmentResult, ProviderError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            provider_type,
            deferrable: false,
            defer_this: false,
            on_enrich: Box::new(on_enrich),
            on_resume: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `mock`/MOCK provider returning an empty successful result.
    pub fn succeeding() -> Self {
        Self::new("mock", ProviderType::Mock, |_, _, _| {
            Ok(EnrichmentResult::default())
        })
    }

    /// Returns a clone of `result` on every call.
    pub fn with_result(
        name: impl Into<String>,
        provider_type: ProviderType,
        result: EnrichmentResult,
    ) -> Self {
        Self::new(name, provider_type, move |_, _, _| Ok(result.clone()))
    }

    pub fn failing(name: impl Into<String>, provider_type: ProviderType, message: &str) -> Self {
        let message = message.to_string();
        Self::new(name, provider_type, move |_, _, _| {
            Err(ProviderError::failed(message.clone()))
        })
    }

    pub fn retryable(
        name: impl Into<String>,
        provider_type: ProviderType,
        reason: &str,
        retry_after: Option<Duration>,
    ) -> Self {
        let reason = reason.to_string();
        Self::new(name, provider_type, move |_, _, _| {
            Err(ProviderError::retryable(reason.clone(), retry_after))
        })
    }

    pub fn waiting(
        name: impl Into<String>,
        provider_type: ProviderType,
        request: WaitForInputRequest,
    ) -> Self {
        Self::new(name, provider_type, move |_, _, _| {
            Err(ProviderError::wait_for_input(request.clone()))
        })
    }

    /// Opt into Phase-2 deferral for every activity.
    pub fn deferring(mut self) -> Self {
        self.deferrable = true;
        self.defer_this = true;
        self
    }

    /// Deferrable, but declining to defer.
    pub fn deferrable_but_declining(mut self) -> Self {
        self.deferrable = true;
        self.defer_this = false;
        self
    }

    /// Add resume support.
    pub fn resumable_with(
        mut self,
        on_resume: impl Fn(&StandardizedActivity, &UserRecord, &PendingInput) -> Result<EnrichmentResult, ProviderError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_resume = Some(Box::new(on_resume));
        self
    }

    /// Every dispatch observed so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EnricherProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    async fn enrich(
        &self,
        ctx: &EnrichContext,
        activity: &StandardizedActivity,
        user: &UserRecord,
        config: &ProviderConfig,
    ) -> Result<EnrichmentResult, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            resumed: false,
            do_not_retry: ctx.do_not_retry,
            config: config
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        (self.on_enrich)(activity, user, config)
    }

    fn deferrable(&self) -> bool {
        self.deferrable
    }

    fn should_defer(&self, _activity: &StandardizedActivity) -> bool {
        self.defer_this
    }

    fn supports_resume(&self) -> bool {
        self.on_resume.is_some()
    }

    async fn enrich_resume(
        &self,
        _ctx: &EnrichContext,
        activity: &StandardizedActivity,
        user: &UserRecord,
        pending_input: &PendingInput,
    ) -> Result<EnrichmentResult, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            resumed: true,
            do_not_retry: false,
            config: Vec::new(),
        });
        match &self.on_resume {
            Some(f) => f(activity, user, pending_input),
            None => Err(ProviderError::failed("resume not configured")),
        }
    }
}

//! Two-phase provider dispatch.
//!
//! Phase 1 walks the configured enricher chain in order; providers
//! that opt to defer are collected and re-run in Phase 2 with the
//! Phase-1 description composition in their config. The branding step
//! runs last, outside the configured chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fitglue_core::{
    PendingInputStatus, PipelineRunStatus, ProviderExecution, ProviderExecutionStatus,
};
use fitglue_provider::config::reserved;
use fitglue_provider::{EnrichContext, EnricherProvider, ProviderConfig, ProviderError};

use crate::error::EngineError;
use crate::notifications::{notify_user, NotificationKind};
use crate::orchestrator::waiting::pending_status_message;
use crate::orchestrator::{merge, EnrichmentState, Orchestrator, RetrySignal};

/// How the whole chain ended.
pub(crate) enum DispatchOutcome {
    Completed,
    Halted(String),
    Retry(RetrySignal),
    Waiting,
}

/// How one provider call ended.
enum StepOutcome {
    Merged,
    Halted(String),
    Retry(RetrySignal),
    Waiting,
}

impl Orchestrator {
    pub(crate) async fn run_enrichers(
        &self,
        state: &mut EnrichmentState,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, EngineError> {
        let entries: Vec<_> = state.pipeline.enrichers.clone().into_iter().enumerate().collect();
        let mut deferred: Vec<(usize, Arc<dyn EnricherProvider>, HashMap<String, String>)> =
            Vec::new();

        for (index, entry) in entries {
            if cancel.is_cancelled() {
                return self.fail_cancelled(state).await;
            }

            let Some(provider) = self.registry.get_by_type(entry.provider) else {
                state.trace.push(skip_row(
                    entry.provider.as_str_name(),
                    self.ids.new_id(),
                    "provider_not_registered",
                ));
                continue;
            };
            if self.registry.is_unavailable(entry.provider) {
                state.trace.push(skip_row(
                    provider.name(),
                    self.ids.new_id(),
                    "temporarily_unavailable",
                ));
                continue;
            }
            if state.payload.is_resume
                && !state.payload.resume_only_enrichers.is_empty()
                && !state
                    .payload
                    .resume_only_enrichers
                    .iter()
                    .any(|n| n == provider.name())
            {
                state.trace.push(skip_row(
                    provider.name(),
                    self.ids.new_id(),
                    "not_in_resume_list",
                ));
                continue;
            }
            if !state.payload.is_resume
                && provider.deferrable()
                && provider.should_defer(&state.activity)
            {
                deferred.push((index, provider, entry.config.clone()));
                continue;
            }

            match self
                .dispatch_one(state, index, provider, &entry.config, None, cancel)
                .await?
            {
                StepOutcome::Merged => {}
                StepOutcome::Halted(reason) => return Ok(DispatchOutcome::Halted(reason)),
                StepOutcome::Retry(signal) => return Ok(DispatchOutcome::Retry(signal)),
                StepOutcome::Waiting => return Ok(DispatchOutcome::Waiting),
            }
        }

        if !deferred.is_empty() {
            let phase1_description = state.slots.compose();
            for (index, provider, config) in deferred {
                if cancel.is_cancelled() {
                    return self.fail_cancelled(state).await;
                }
                match self
                    .dispatch_one(
                        state,
                        index,
                        provider,
                        &config,
                        Some(&phase1_description),
                        cancel,
                    )
                    .await?
                {
                    StepOutcome::Merged => {}
                    StepOutcome::Halted(reason) => return Ok(DispatchOutcome::Halted(reason)),
                    StepOutcome::Retry(signal) => return Ok(DispatchOutcome::Retry(signal)),
                    StepOutcome::Waiting => return Ok(DispatchOutcome::Waiting),
                }
            }
        }

        Ok(DispatchOutcome::Completed)
    }

    /// Branding step for tiers that require it. Runs after the chain
    /// and the marker reconciler; failures leave the run unbranded.
    pub(crate) async fn apply_branding(
        &self,
        state: &mut EnrichmentState,
        cancel: &CancellationToken,
    ) {
        let Some(provider) = self
            .registry
            .get_by_type(fitglue_core::ProviderType::Branding)
        else {
            return;
        };

        let mut config = ProviderConfig::new();
        self.overlay_reserved(&mut config, state);
        let ctx = EnrichContext::new(cancel.clone(), state.do_not_retry);
        let started = Instant::now();
        let execution_id = self.ids.new_id();

        match provider
            .enrich(&ctx, &state.activity, &state.user, &config)
            .await
        {
            Ok(result) => {
                state.trace.push(ProviderExecution {
                    provider_name: provider.name().to_string(),
                    execution_id,
                    status: ProviderExecutionStatus::Success,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: None,
                    metadata: result.metadata.clone(),
                });
                if !result.description.is_empty() {
                    state
                        .slots
                        .push_appendix(fitglue_core::ProviderType::Branding, &result.description);
                    state
                        .applied
                        .push((fitglue_core::ProviderType::Branding, "branding".to_string()));
                }
            }
            Err(e) => {
                warn!(error = %e, "branding step failed, continuing unbranded");
                state.trace.push(ProviderExecution {
                    provider_name: provider.name().to_string(),
                    execution_id,
                    status: ProviderExecutionStatus::Failed,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                    metadata: IndexMap::new(),
                });
            }
        }
    }

    async fn dispatch_one(
        &self,
        state: &mut EnrichmentState,
        index: usize,
        provider: Arc<dyn EnricherProvider>,
        user_config: &HashMap<String, String>,
        phase1_description: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, EngineError> {
        let user_id = state.payload.user_id.clone();

        // A fresh (non-resume) run invalidates stale WAITING inputs so
        // the provider can ask again with current context.
        if !state.payload.is_resume {
            if let Err(e) = self
                .pending
                .clear_stale_waiting(
                    &user_id,
                    state.payload.source,
                    &state.activity.external_id,
                    provider.name(),
                )
                .await
            {
                warn!(provider = provider.name(), error = %e, "stale pending-input cleanup failed");
            }
        }

        let mut config = ProviderConfig::from_map(user_config);
        self.overlay_reserved(&mut config, state);
        if let Some(description) = phase1_description {
            config.insert(reserved::ENRICHED_DESCRIPTION, description);
        }

        let ctx = EnrichContext::new(cancel.clone(), state.do_not_retry);
        let started = Instant::now();
        let execution_id = self.ids.new_id();

        let outcome = 'call: {
            if state.payload.is_resume
                && !state.payload.resume_pending_input_id.is_empty()
                && provider.supports_resume()
            {
                match self
                    .pending
                    .get(&user_id, &state.payload.resume_pending_input_id)
                    .await
                {
                    Ok(Some(input)) if input.status == PendingInputStatus::Completed => {
                        break 'call provider
                            .enrich_resume(&ctx, &state.activity, &state.user, &input)
                            .await;
                    }
                    Ok(_) => {
                        info!(
                            provider = provider.name(),
                            "pending input missing or incomplete, running normal enrich"
                        );
                    }
                    Err(e) => {
                        warn!(provider = provider.name(), error = %e, "pending input read failed");
                    }
                }
            }
            provider
                .enrich(&ctx, &state.activity, &state.user, &config)
                .await
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                state.trace.push(ProviderExecution {
                    provider_name: provider.name().to_string(),
                    execution_id,
                    status: ProviderExecutionStatus::Success,
                    duration_ms,
                    error: None,
                    metadata: result.metadata.clone(),
                });

                merge::apply_result(&mut state.activity, &mut state.slots, index, &result);
                for (k, v) in &result.metadata {
                    state.metadata.insert(k.clone(), v.clone());
                }
                if !result.section_header.is_empty() {
                    state.metadata.insert(
                        format!(
                            "section_header_{}",
                            provider.provider_type().as_str_name().to_lowercase()
                        ),
                        result.section_header.clone(),
                    );
                }
                state.applied.push((
                    provider.provider_type(),
                    provider.provider_type().as_str_name().to_string(),
                ));

                if result.halt_pipeline {
                    let reason = if result.halt_reason.is_empty() {
                        format!("halted by {}", provider.name())
                    } else {
                        result.halt_reason.clone()
                    };
                    return Ok(StepOutcome::Halted(reason));
                }
                Ok(StepOutcome::Merged)
            }

            Err(ProviderError::Retryable { reason, retry_after }) => {
                // Expected lag, not a failure: keep the noise out of
                // error-level alerting.
                info!(provider = provider.name(), %reason, "provider signalled retry");
                state.trace.push(ProviderExecution {
                    provider_name: provider.name().to_string(),
                    execution_id,
                    status: ProviderExecutionStatus::Retry,
                    duration_ms,
                    error: Some(reason.clone()),
                    metadata: IndexMap::new(),
                });
                self.runs
                    .set_status(
                        &user_id,
                        &state.execution_id,
                        PipelineRunStatus::Running,
                        Some(&format!("Waiting for source data: {reason}")),
                    )
                    .await?;
                Ok(StepOutcome::Retry(RetrySignal { reason, retry_after }))
            }

            Err(ProviderError::WaitForInput(request)) => {
                state.trace.push(ProviderExecution {
                    provider_name: provider.name().to_string(),
                    execution_id,
                    status: ProviderExecutionStatus::Waiting,
                    duration_ms,
                    error: None,
                    metadata: IndexMap::new(),
                });
                let message =
                    pending_status_message(&request.metadata, &request.required_fields);
                self.runs
                    .set_status(
                        &user_id,
                        &state.execution_id,
                        PipelineRunStatus::Pending,
                        Some(&message),
                    )
                    .await?;
                self.handle_wait_for_input(state, provider.name(), &request, &message)
                    .await?;
                Ok(StepOutcome::Waiting)
            }

            Err(ProviderError::Failed(source)) => {
                state.trace.push(ProviderExecution {
                    provider_name: provider.name().to_string(),
                    execution_id,
                    status: ProviderExecutionStatus::Failed,
                    duration_ms,
                    error: Some(source.to_string()),
                    metadata: IndexMap::new(),
                });
                self.runs
                    .set_status(
                        &user_id,
                        &state.execution_id,
                        PipelineRunStatus::Failed,
                        Some(&source.to_string()),
                    )
                    .await?;

                let name = if state.activity.name.is_empty() {
                    "Your activity"
                } else {
                    &state.activity.name
                };
                notify_user(
                    self.notifier.as_ref(),
                    &state.user,
                    NotificationKind::PipelineFailure,
                    "Sync failed",
                    &format!("{name} could not be enriched"),
                    HashMap::new(),
                )
                .await;

                Err(EngineError::Provider {
                    provider: provider.name().to_string(),
                    source,
                })
            }
        }
    }

    fn overlay_reserved(&self, config: &mut ProviderConfig, state: &EnrichmentState) {
        config.insert(reserved::PIPELINE_EXECUTION_ID, &state.execution_id);
        config.insert(reserved::PIPELINE_ID, &state.pipeline.id);
        config.insert(reserved::ACTIVITY_ID, &state.activity_id);
        config.insert(reserved::EXTERNAL_ID, &state.activity.external_id);
    }

    async fn fail_cancelled(
        &self,
        state: &EnrichmentState,
    ) -> Result<DispatchOutcome, EngineError> {
        warn!(execution_id = %state.execution_id, "invocation cancelled");
        if let Err(e) = self
            .runs
            .set_status(
                &state.payload.user_id,
                &state.execution_id,
                PipelineRunStatus::Failed,
                Some("operation cancelled"),
            )
            .await
        {
            warn!(error = %e, "failed to record cancellation");
        }
        Err(EngineError::Cancelled)
    }
}

fn skip_row(provider_name: &str, execution_id: String, reason: &str) -> ProviderExecution {
    let mut metadata = IndexMap::new();
    metadata.insert("reason".to_string(), reason.to_string());
    ProviderExecution {
        provider_name: provider_name.to_string(),
        execution_id,
        status: ProviderExecutionStatus::Skipped,
        duration_ms: 0,
        error: None,
        metadata,
    }
}

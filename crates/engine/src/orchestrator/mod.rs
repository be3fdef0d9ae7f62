//! The per-pipeline enrichment orchestrator.
//!
//! One invocation processes exactly one pipeline for one activity:
//! tier gate, run bootstrap, two-phase provider dispatch, time-marker
//! reconciliation, branding, event assembly, and exclusion fan-out.
//! Suspension points (retryable lag, waiting for user input) park the
//! run and hand control back to the framing wrapper.

mod dispatch;
mod fanout;
pub(crate) mod merge;
pub(crate) mod waiting;

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use fitglue_core::{
    ActivityPayload, Clock, DestinationOutcome, EnrichedEvent, IdSource, PipelineConfig,
    PipelineRun, PipelineRunStatus, ProviderExecution, ProviderType, StandardizedActivity,
    UserRecord,
};
use fitglue_notify::PushSender;
use fitglue_provider::ProviderRegistry;
use fitglue_queue::Publisher;
use fitglue_storage::{paths, BlobStore, DocumentStore};

use crate::error::EngineError;
use crate::lifecycle::RunStore;
use crate::markers::reconcile_exercise_markers;
use crate::slots::DescriptionSlots;
use crate::stores::{PendingInputStore, PipelineStore, UserStore};

pub(crate) use dispatch::DispatchOutcome;

/// How an accepted invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Success,
    Skipped,
    Waiting,
    LaggedRetry,
}

/// Retry details accompanying [`ProcessStatus::LaggedRetry`].
#[derive(Debug, Clone)]
pub struct RetrySignal {
    pub reason: String,
    pub retry_after: Option<Duration>,
}

/// Result of one `process` invocation.
#[derive(Debug)]
pub struct ProcessResult {
    pub status: ProcessStatus,
    /// Enriched events, one per exclusion group, already published.
    pub events: Vec<EnrichedEvent>,
    pub provider_executions: Vec<ProviderExecution>,
    pub pipeline_execution_id: String,
    pub retry: Option<RetrySignal>,
}

impl ProcessResult {
    fn empty(status: ProcessStatus, execution_id: String) -> Self {
        Self {
            status,
            events: Vec::new(),
            provider_executions: Vec::new(),
            pipeline_execution_id: execution_id,
            retry: None,
        }
    }
}

/// Working state threaded through dispatch, merge, and fan-out.
pub(crate) struct EnrichmentState {
    pub payload: ActivityPayload,
    pub activity: StandardizedActivity,
    pub user: UserRecord,
    pub pipeline: PipelineConfig,
    pub execution_id: String,
    pub activity_id: String,
    pub original_payload_uri: String,
    pub slots: DescriptionSlots,
    pub trace: Vec<ProviderExecution>,
    /// Successful enrichments: provider type plus the string recorded
    /// in `applied_enrichments`.
    pub applied: Vec<(ProviderType, String)>,
    pub metadata: IndexMap<String, String>,
    pub do_not_retry: bool,
}

pub struct Orchestrator {
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) blob: Arc<dyn BlobStore>,
    pub(crate) publisher: Arc<dyn Publisher>,
    pub(crate) notifier: Option<Arc<dyn PushSender>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdSource>,
    pub(crate) users: UserStore,
    pub(crate) pipelines: PipelineStore,
    pub(crate) pending: PendingInputStore,
    pub(crate) runs: RunStore,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn DocumentStore>,
        blob: Arc<dyn BlobStore>,
        publisher: Arc<dyn Publisher>,
        notifier: Option<Arc<dyn PushSender>>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self {
            registry,
            blob,
            publisher,
            notifier,
            clock: clock.clone(),
            ids,
            users: UserStore::new(store.clone()),
            pipelines: PipelineStore::new(store.clone()),
            pending: PendingInputStore::new(store.clone()),
            runs: RunStore::new(store, clock),
        }
    }

    /// Process one targeted activity-for-one-pipeline message.
    ///
    /// `parent_execution_id` links trace output to the upstream
    /// splitter invocation; `base_execution_id` seeds the pipeline
    /// execution id so reposts stay correlated.
    pub async fn process(
        &self,
        payload: ActivityPayload,
        parent_execution_id: Option<&str>,
        base_execution_id: Option<&str>,
        do_not_retry: bool,
        cancel: &CancellationToken,
    ) -> Result<ProcessResult, EngineError> {
        if payload.pipeline_id.is_empty() {
            return Err(EngineError::Config(
                "payload is missing pipeline_id; splitter must target one pipeline".into(),
            ));
        }

        let base = base_execution_id
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.ids.new_id());
        let execution_id = format!("{base}-{}", payload.pipeline_id);

        let span = tracing::info_span!(
            "enrich",
            user_id = %payload.user_id,
            pipeline_id = %payload.pipeline_id,
            execution_id = %execution_id,
            parent = parent_execution_id.unwrap_or_default(),
        );
        self.process_inner(payload, execution_id, do_not_retry, cancel)
            .instrument(span)
            .await
    }

    async fn process_inner(
        &self,
        payload: ActivityPayload,
        execution_id: String,
        do_not_retry: bool,
        cancel: &CancellationToken,
    ) -> Result<ProcessResult, EngineError> {
        let activity = payload
            .standardized_activity
            .clone()
            .ok_or_else(|| EngineError::Validation("payload has no standardized activity".into()))?;
        let session = activity.session().ok_or_else(|| {
            EngineError::Validation(format!(
                "activity must have exactly one session, got {}",
                activity.sessions.len()
            ))
        })?;
        if session.total_elapsed_time <= 0.0 {
            return Err(EngineError::Validation(
                "session elapsed time must be positive".into(),
            ));
        }
        if payload.is_resume && payload.activity_id.is_empty() {
            return Err(EngineError::Config(
                "resume payload is missing activity_id".into(),
            ));
        }

        // ── Tier gate ───────────────────────────────────────────────
        let mut user = self
            .users
            .get(&payload.user_id)
            .await?
            .ok_or_else(|| EngineError::Config(format!("user {} not found", payload.user_id)))?;

        let now = self.clock.now();
        if user.needs_monthly_reset(now) {
            self.users.reset_monthly_counter(&payload.user_id, now).await?;
            user.sync_count_this_month = 0;
            user.sync_count_reset_at = Some(now);
        }
        if !user.can_sync(now) {
            user.prevented_sync_count += 1;
            self.users
                .record_prevented_sync(&payload.user_id, user.prevented_sync_count)
                .await?;

            let activity_id = self.resolve_activity_id(&payload);
            let run = self.blocked_run(&payload, &activity, &execution_id, &activity_id);
            self.runs.create_best_effort(&payload.user_id, &run).await;
            info!(prevented = user.prevented_sync_count, "sync blocked by tier quota");
            return Ok(ProcessResult::empty(ProcessStatus::Skipped, execution_id));
        }

        // ── Pipeline resolve ────────────────────────────────────────
        let Some(pipeline) = self
            .pipelines
            .resolve(&payload.user_id, &payload.pipeline_id)
            .await?
        else {
            info!("pipeline not found or disabled, skipping");
            return Ok(ProcessResult::empty(ProcessStatus::Skipped, execution_id));
        };

        let activity_id = self.resolve_activity_id(&payload);
        if !payload.is_resume {
            user.sync_count_this_month += 1;
            self.users
                .increment_sync_count(&payload.user_id, user.sync_count_this_month)
                .await?;
        }

        // ── Run bootstrap ───────────────────────────────────────────
        let run = self.running_run(&payload, &activity, &execution_id, &activity_id, &pipeline);
        self.runs.create_best_effort(&payload.user_id, &run).await;

        let original_payload_uri = self
            .snapshot_payload(&payload, &execution_id, &activity_id)
            .await;

        let enricher_types: Vec<ProviderType> =
            pipeline.enrichers.iter().map(|e| e.provider).collect();
        let mut state = EnrichmentState {
            slots: DescriptionSlots::new(&activity.description, &enricher_types),
            activity,
            user,
            pipeline,
            execution_id: execution_id.clone(),
            activity_id,
            original_payload_uri,
            trace: Vec::new(),
            applied: Vec::new(),
            metadata: IndexMap::new(),
            do_not_retry,
            payload,
        };

        // ── Two-phase dispatch ──────────────────────────────────────
        match self.run_enrichers(&mut state, cancel).await? {
            DispatchOutcome::Completed => {}
            DispatchOutcome::Halted(reason) => {
                self.runs
                    .set_status(
                        &state.payload.user_id,
                        &execution_id,
                        PipelineRunStatus::Skipped,
                        Some(&format!("Pipeline halted: {reason}")),
                    )
                    .await?;
                info!(%reason, "pipeline halted by provider");
                return Ok(ProcessResult {
                    status: ProcessStatus::Skipped,
                    events: Vec::new(),
                    provider_executions: state.trace,
                    pipeline_execution_id: execution_id,
                    retry: None,
                });
            }
            DispatchOutcome::Retry(signal) => {
                return Ok(ProcessResult {
                    status: ProcessStatus::LaggedRetry,
                    events: Vec::new(),
                    provider_executions: state.trace,
                    pipeline_execution_id: execution_id,
                    retry: Some(signal),
                });
            }
            DispatchOutcome::Waiting => {
                return Ok(ProcessResult {
                    status: ProcessStatus::Waiting,
                    events: Vec::new(),
                    provider_executions: state.trace,
                    pipeline_execution_id: execution_id,
                    retry: None,
                });
            }
        }

        // ── Post-enrichment ─────────────────────────────────────────
        reconcile_exercise_markers(&mut state.activity);
        if state.user.tier().requires_branding() {
            self.apply_branding(&mut state, cancel).await;
        }

        let events = self.assemble_and_publish(&mut state, cancel).await?;
        info!(events = events.len(), "enrichment complete");
        Ok(ProcessResult {
            status: ProcessStatus::Success,
            events,
            provider_executions: state.trace,
            pipeline_execution_id: execution_id,
            retry: None,
        })
    }

    fn resolve_activity_id(&self, payload: &ActivityPayload) -> String {
        if payload.activity_id.is_empty() {
            self.ids.new_id()
        } else {
            payload.activity_id.clone()
        }
    }

    fn running_run(
        &self,
        payload: &ActivityPayload,
        activity: &StandardizedActivity,
        execution_id: &str,
        activity_id: &str,
        pipeline: &PipelineConfig,
    ) -> PipelineRun {
        let now = self.clock.now();
        PipelineRun {
            id: execution_id.to_string(),
            pipeline_id: payload.pipeline_id.clone(),
            activity_id: activity_id.to_string(),
            source: payload.source,
            source_activity_id: activity.external_id.clone(),
            title: activity.name.clone(),
            description: activity.description.clone(),
            activity_type: activity.activity_type,
            start_time: activity.session().and_then(|s| s.start_time),
            status: PipelineRunStatus::Running,
            status_message: None,
            destinations: pipeline
                .destinations
                .iter()
                .map(|d| DestinationOutcome::pending(*d))
                .collect(),
            boosters: Vec::new(),
            original_payload_uri: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn blocked_run(
        &self,
        payload: &ActivityPayload,
        activity: &StandardizedActivity,
        execution_id: &str,
        activity_id: &str,
    ) -> PipelineRun {
        let now = self.clock.now();
        PipelineRun {
            id: execution_id.to_string(),
            pipeline_id: payload.pipeline_id.clone(),
            activity_id: activity_id.to_string(),
            source: payload.source,
            source_activity_id: activity.external_id.clone(),
            title: activity.name.clone(),
            description: activity.description.clone(),
            activity_type: activity.activity_type,
            start_time: activity.session().and_then(|s| s.start_time),
            status: PipelineRunStatus::TierBlocked,
            status_message: Some("Monthly sync limit reached - upgrade to keep syncing".into()),
            destinations: Vec::new(),
            boosters: Vec::new(),
            original_payload_uri: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// PUT the untouched payload to blob storage and record the URI on
    /// the run. Best-effort on both sides.
    async fn snapshot_payload(
        &self,
        payload: &ActivityPayload,
        execution_id: &str,
        activity_id: &str,
    ) -> String {
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "payload marshal failed, skipping snapshot");
                return String::new();
            }
        };
        let path = paths::payload_blob(&payload.user_id, activity_id);
        match self.blob.put_path(&path, bytes.into()).await {
            Ok(uri) => {
                if let Err(e) = self
                    .runs
                    .merge(
                        &payload.user_id,
                        execution_id,
                        json!({ "original_payload_uri": uri.as_str() }),
                    )
                    .await
                {
                    warn!(error = %e, "failed to record payload uri on run");
                }
                uri
            }
            Err(e) => {
                warn!(error = %e, "payload snapshot upload failed");
                String::new()
            }
        }
    }
}

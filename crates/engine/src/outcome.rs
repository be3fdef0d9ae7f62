//! Destination outcome reconciliation.
//!
//! Uploaders report per-destination results concurrently; correctness
//! comes from disjoint outcome document ids (the destination integer
//! code) and an idempotent roll-up over the subcollection. The
//! terminal notification fires at most once: the reconciler observes
//! the parent run's prior status before writing the roll-up.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use fitglue_core::{
    Clock, Destination, DestinationOutcome, DestinationStatus, PipelineRunStatus,
};
use fitglue_notify::PushSender;
use fitglue_storage::{DocumentStore, StorageError};

use crate::error::EngineError;
use crate::lifecycle::RunStore;
use crate::notifications::{notify_user, NotificationKind};
use crate::stores::UserStore;

/// One uploader report.
#[derive(Debug, Clone)]
pub struct OutcomeUpdate {
    pub user_id: String,
    pub pipeline_run_id: String,
    pub destination: Destination,
    pub status: DestinationStatus,
    pub external_id: Option<String>,
    pub error: Option<String>,
    /// For the notification body.
    pub activity_name: String,
    pub activity_id: String,
}

pub struct OutcomeReconciler {
    runs: RunStore,
    users: UserStore,
    notifier: Option<Arc<dyn PushSender>>,
    clock: Arc<dyn Clock>,
}

impl OutcomeReconciler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Option<Arc<dyn PushSender>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runs: RunStore::new(store.clone(), clock.clone()),
            users: UserStore::new(store),
            notifier,
            clock,
        }
    }

    /// Record one destination's result and roll the run status up.
    ///
    /// Returns the reconciled parent status.
    pub async fn update_status(
        &self,
        update: OutcomeUpdate,
    ) -> Result<PipelineRunStatus, EngineError> {
        let user_id = &update.user_id;
        let run_id = &update.pipeline_run_id;

        // Prior status decides whether this write is the terminal
        // transition (and therefore the one that notifies).
        let prior = self
            .runs
            .get(user_id, run_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("pipeline run {run_id}")))?;

        let now = self.clock.now();
        let completed_at = update.status.is_terminal().then_some(now);
        self.runs
            .merge_outcome(
                user_id,
                run_id,
                &update.destination,
                json!({
                    "destination": update.destination,
                    "status": update.status.code(),
                    "external_id": update.external_id,
                    "error": update.error,
                    "completed_at": completed_at,
                    "updated_at": now,
                }),
            )
            .await?;

        let outcomes = self.runs.list_outcomes(user_id, run_id).await?;
        let rollup = compute_rollup(&outcomes);

        self.runs
            .merge(
                user_id,
                run_id,
                json!({
                    "status": rollup.code(),
                    "destinations": outcomes,
                }),
            )
            .await?;
        debug!(user_id, run_id, status = rollup.code(), "roll-up updated");

        let was_terminal = matches!(
            prior.status,
            PipelineRunStatus::Synced | PipelineRunStatus::Partial
        );
        let is_terminal = matches!(
            rollup,
            PipelineRunStatus::Synced | PipelineRunStatus::Partial
        );
        if is_terminal && !was_terminal {
            self.send_terminal_notification(&update, rollup).await?;
        }

        Ok(rollup)
    }

    async fn send_terminal_notification(
        &self,
        update: &OutcomeUpdate,
        rollup: PipelineRunStatus,
    ) -> Result<(), EngineError> {
        let Some(user) = self.users.get(&update.user_id).await? else {
            return Ok(());
        };

        let name = if update.activity_name.is_empty() {
            "Your activity"
        } else {
            &update.activity_name
        };
        let (kind, title, body) = match rollup {
            PipelineRunStatus::Synced => (
                NotificationKind::PipelineSuccess,
                "Activity synced".to_string(),
                format!("{name} was delivered to all destinations"),
            ),
            _ => (
                NotificationKind::PipelineFailure,
                "Sync partially failed".to_string(),
                format!("{name} could not be delivered everywhere"),
            ),
        };
        info!(user_id = %update.user_id, run_id = %update.pipeline_run_id, "terminal roll-up notification");

        let mut data = HashMap::new();
        data.insert("pipeline_run_id".to_string(), update.pipeline_run_id.clone());
        data.insert("activity_id".to_string(), update.activity_id.clone());
        notify_user(self.notifier.as_ref(), &user, kind, &title, &body, data).await;
        Ok(())
    }
}

/// Roll destination outcomes up into a run status.
///
/// No outcomes, or any still PENDING, keeps the run RUNNING. Once all
/// are terminal: any FAILED makes it PARTIAL, otherwise SYNCED.
pub fn compute_rollup(outcomes: &[DestinationOutcome]) -> PipelineRunStatus {
    if outcomes.is_empty() {
        return PipelineRunStatus::Running;
    }
    if outcomes
        .iter()
        .any(|o| o.status == DestinationStatus::Pending)
    {
        return PipelineRunStatus::Running;
    }
    if outcomes
        .iter()
        .any(|o| o.status == DestinationStatus::Failed)
    {
        return PipelineRunStatus::Partial;
    }
    PipelineRunStatus::Synced
}

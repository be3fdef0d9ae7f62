//! Pipeline-run lifecycle.
//!
//! The run document is created when the orchestrator accepts a
//! message, mutated only by the orchestrator during execution, and
//! afterwards only through outcome writes and the reconciler.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use fitglue_core::{
    Clock, Destination, DestinationOutcome, PipelineRun, PipelineRunStatus, ProviderExecution,
};
use fitglue_storage::{paths, DocumentStore, StorageError};

pub struct RunStore {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl RunStore {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get(
        &self,
        user_id: &str,
        run_id: &str,
    ) -> Result<Option<PipelineRun>, StorageError> {
        match self.store.get(&paths::pipeline_run(user_id, run_id)).await? {
            Some(doc) => Ok(Some(
                serde_json::from_value(doc).map_err(|e| StorageError::Serialize(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Create the run document plus one PENDING outcome document per
    /// destination, so uploaders can merge-write without reading
    /// first.
    pub async fn create(&self, user_id: &str, run: &PipelineRun) -> Result<(), StorageError> {
        let doc =
            serde_json::to_value(run).map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.store
            .set(&paths::pipeline_run(user_id, &run.id), doc)
            .await?;

        for outcome in &run.destinations {
            let outcome_doc = serde_json::to_value(outcome)
                .map_err(|e| StorageError::Serialize(e.to_string()))?;
            self.store
                .set(
                    &paths::destination_outcome(user_id, &run.id, &outcome.destination),
                    outcome_doc,
                )
                .await?;
        }
        Ok(())
    }

    /// Best-effort create: bootstrap failures are logged, never fatal.
    pub async fn create_best_effort(&self, user_id: &str, run: &PipelineRun) {
        if let Err(e) = self.create(user_id, run).await {
            warn!(user_id, run_id = %run.id, error = %e, "pipeline run bootstrap write failed");
        }
    }

    pub async fn set_status(
        &self,
        user_id: &str,
        run_id: &str,
        status: PipelineRunStatus,
        message: Option<&str>,
    ) -> Result<(), StorageError> {
        self.merge(
            user_id,
            run_id,
            json!({
                "status": status.code(),
                "status_message": message,
            }),
        )
        .await
    }

    /// Merge-write arbitrary fields, stamping `updated_at`.
    pub async fn merge(
        &self,
        user_id: &str,
        run_id: &str,
        mut patch: Value,
    ) -> Result<(), StorageError> {
        if let Some(obj) = patch.as_object_mut() {
            obj.insert("updated_at".into(), json!(self.clock.now()));
        }
        self.store
            .merge(&paths::pipeline_run(user_id, run_id), patch)
            .await
    }

    /// Final post-enrichment update: titles, trace, cleared pending
    /// message, back to RUNNING until uploaders report in.
    #[allow(clippy::too_many_arguments)]
    pub async fn finalize(
        &self,
        user_id: &str,
        run_id: &str,
        title: &str,
        description: &str,
        activity_type: fitglue_core::ActivityType,
        start_time: Option<chrono::DateTime<chrono::Utc>>,
        status: PipelineRunStatus,
        boosters: &[ProviderExecution],
        original_payload_uri: &str,
    ) -> Result<(), StorageError> {
        self.merge(
            user_id,
            run_id,
            json!({
                "title": title,
                "description": description,
                "type": activity_type,
                "start_time": start_time,
                "status": status.code(),
                "status_message": Value::Null,
                "boosters": boosters,
                "original_payload_uri": original_payload_uri,
            }),
        )
        .await
    }

    /// Merge one destination outcome document.
    pub async fn merge_outcome(
        &self,
        user_id: &str,
        run_id: &str,
        destination: &Destination,
        patch: Value,
    ) -> Result<(), StorageError> {
        self.store
            .merge(
                &paths::destination_outcome(user_id, run_id, destination),
                patch,
            )
            .await
    }

    /// All outcome documents under a run, in doc-id order.
    pub async fn list_outcomes(
        &self,
        user_id: &str,
        run_id: &str,
    ) -> Result<Vec<DestinationOutcome>, StorageError> {
        let docs = self
            .store
            .list(&paths::destination_outcomes(user_id, run_id))
            .await?;
        docs.into_iter()
            .map(|(_, doc)| {
                serde_json::from_value(doc).map_err(|e| StorageError::Serialize(e.to_string()))
            })
            .collect()
    }
}

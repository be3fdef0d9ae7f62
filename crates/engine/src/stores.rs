//! Typed accessors over the document store for users, pipelines, and
//! pending inputs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use fitglue_core::{PendingInput, PendingInputStatus, PipelineConfig, Source, UserRecord};
use fitglue_storage::{paths, DocumentStore, StorageError};

pub struct UserStore {
    store: Arc<dyn DocumentStore>,
}

impl UserStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError> {
        match self.store.get(&paths::user(user_id)).await? {
            Some(doc) => Ok(Some(
                serde_json::from_value(doc).map_err(|e| StorageError::Serialize(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Reset the monthly sync counter (start-of-month UTC boundary).
    pub async fn reset_monthly_counter(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.store
            .merge(
                &paths::user(user_id),
                json!({
                    "sync_count_this_month": 0,
                    "sync_count_reset_at": now,
                }),
            )
            .await
    }

    pub async fn record_prevented_sync(
        &self,
        user_id: &str,
        new_count: u32,
    ) -> Result<(), StorageError> {
        self.store
            .merge(
                &paths::user(user_id),
                json!({ "prevented_sync_count": new_count }),
            )
            .await
    }

    pub async fn increment_sync_count(
        &self,
        user_id: &str,
        new_count: u32,
    ) -> Result<(), StorageError> {
        self.store
            .merge(
                &paths::user(user_id),
                json!({ "sync_count_this_month": new_count }),
            )
            .await
    }
}

pub struct PipelineStore {
    store: Arc<dyn DocumentStore>,
}

impl PipelineStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Resolve a pipeline. Disabled pipelines are treated as not
    /// found.
    pub async fn resolve(
        &self,
        user_id: &str,
        pipeline_id: &str,
    ) -> Result<Option<PipelineConfig>, StorageError> {
        let Some(doc) = self.store.get(&paths::pipeline(user_id, pipeline_id)).await? else {
            return Ok(None);
        };
        let pipeline: PipelineConfig =
            serde_json::from_value(doc).map_err(|e| StorageError::Serialize(e.to_string()))?;
        if pipeline.disabled {
            debug!(user_id, pipeline_id, "pipeline disabled, treating as not found");
            return Ok(None);
        }
        Ok(Some(pipeline))
    }
}

pub struct PendingInputStore {
    store: Arc<dyn DocumentStore>,
}

impl PendingInputStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        user_id: &str,
        input_id: &str,
    ) -> Result<Option<PendingInput>, StorageError> {
        match self.store.get(&paths::pending_input(user_id, input_id)).await? {
            Some(doc) => Ok(Some(
                serde_json::from_value(doc).map_err(|e| StorageError::Serialize(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub async fn put(&self, input: &PendingInput) -> Result<(), StorageError> {
        let doc = serde_json::to_value(input)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.store
            .set(&paths::pending_input(&input.user_id, &input.id), doc)
            .await
    }

    /// Every WAITING input for one provider, across all tenants.
    /// This is the single collection-group scan in the system; the
    /// results poller uses it to resolve inputs in bulk.
    pub async fn find_waiting_for_provider(
        &self,
        provider_name: &str,
    ) -> Result<Vec<PendingInput>, StorageError> {
        let docs = self
            .store
            .scan_group(
                paths::PENDING_INPUTS,
                &[
                    ("enricher_provider_id", json!(provider_name)),
                    ("status", json!(PendingInputStatus::Waiting.as_str_name())),
                ],
            )
            .await?;
        docs.into_iter()
            .map(|(_, doc)| {
                serde_json::from_value(doc).map_err(|e| StorageError::Serialize(e.to_string()))
            })
            .collect()
    }

    /// Drop a stale WAITING pending input for this
    /// `(source, external id, provider)` so a re-run gathers fresh
    /// user input. Completed inputs are left alone.
    pub async fn clear_stale_waiting(
        &self,
        user_id: &str,
        source: Source,
        source_external_id: &str,
        provider_name: &str,
    ) -> Result<(), StorageError> {
        let id = fitglue_core::pending_input_id(source, source_external_id, provider_name);
        if let Some(existing) = self.get(user_id, &id).await? {
            if existing.status == PendingInputStatus::Waiting {
                debug!(user_id, input_id = %id, "clearing stale waiting input");
                self.store.delete(&paths::pending_input(user_id, &id)).await?;
            }
        }
        Ok(())
    }
}

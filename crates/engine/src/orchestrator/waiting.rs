//! Wait-for-input suspension.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use fitglue_core::{pending_input_id, PendingInput, PendingInputStatus};
use fitglue_provider::WaitForInputRequest;
use fitglue_storage::paths;

use crate::error::EngineError;
use crate::notifications::{notify_user, NotificationKind};
use crate::orchestrator::{EnrichmentState, Orchestrator};

/// User-visible PENDING message. Priority: `display.summary`, then
/// `display.field_labels` humanization, then Title-Cased field names.
pub(crate) fn pending_status_message(
    metadata: &HashMap<String, String>,
    required_fields: &[String],
) -> String {
    let detail = if let Some(summary) = metadata.get("display.summary") {
        summary.clone()
    } else if let Some(labels_json) = metadata.get("display.field_labels") {
        let labels: HashMap<String, String> = serde_json::from_str::<Value>(labels_json)
            .ok()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        required_fields
            .iter()
            .map(|f| labels.get(f).cloned().unwrap_or_else(|| title_case(f)))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        required_fields
            .iter()
            .map(|f| title_case(f))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("Waiting for user input: {detail}")
}

/// `finish_position` -> `Finish Position`.
fn title_case(field: &str) -> String {
    field
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Orchestrator {
    /// Create or refresh the pending input and notify the user.
    ///
    /// Preflight: a COMPLETED input for the same key is never
    /// overwritten; the user already answered and the resume path will
    /// consume it.
    pub(crate) async fn handle_wait_for_input(
        &self,
        state: &EnrichmentState,
        provider_name: &str,
        request: &WaitForInputRequest,
        status_message: &str,
    ) -> Result<(), EngineError> {
        let user_id = &state.payload.user_id;
        let input_id = pending_input_id(
            state.payload.source,
            &state.activity.external_id,
            provider_name,
        );

        if let Some(existing) = self.pending.get(user_id, &input_id).await? {
            if existing.status == PendingInputStatus::Completed {
                debug!(user_id, input_id = %input_id, "pending input already completed, keeping it");
                return Ok(());
            }
        }

        // Snapshot the in-flight payload so the resume can rebuild the
        // run even after the original message is gone. Best-effort.
        let mut snapshot_uri = String::new();
        match serde_json::to_vec(&state.payload) {
            Ok(bytes) => {
                let path = paths::payload_blob(user_id, &request.activity_id);
                match self.blob.put_path(&path, bytes.into()).await {
                    Ok(uri) => snapshot_uri = uri,
                    Err(e) => {
                        warn!(user_id, error = %e, "pending-input payload snapshot failed")
                    }
                }
            }
            Err(e) => warn!(user_id, error = %e, "payload marshal for snapshot failed"),
        }

        let now = self.clock.now();
        let input = PendingInput {
            id: input_id.clone(),
            user_id: user_id.clone(),
            status: PendingInputStatus::Waiting,
            required_fields: request.required_fields.clone(),
            enricher_provider_id: provider_name.to_string(),
            pipeline_id: state.pipeline.id.clone(),
            linked_activity_id: state.activity_id.clone(),
            original_payload_uri: snapshot_uri,
            provider_metadata: request.metadata.clone(),
            input_data: HashMap::new(),
            auto_deadline: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.pending.put(&input).await?;

        let mut data = HashMap::new();
        data.insert("pending_input_id".to_string(), input_id);
        data.insert("activity_id".to_string(), state.activity_id.clone());
        notify_user(
            self.notifier.as_ref(),
            &state.user,
            NotificationKind::PendingInput,
            "Input needed",
            status_message,
            data,
        )
        .await;
        Ok(())
    }
}

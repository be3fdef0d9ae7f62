//! Event assembly, config injection, and destination exclusion
//! fan-out.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fitglue_core::{Destination, EnrichedEvent, PipelineRunStatus};
use fitglue_queue::topics;
use fitglue_storage::paths;

use crate::error::EngineError;
use crate::fitfile;
use crate::orchestrator::{EnrichmentState, Orchestrator};

impl Orchestrator {
    /// Final assembly: inject configs, synthesize the fit artifact,
    /// finalize the run, split per exclusion group, publish.
    pub(crate) async fn assemble_and_publish(
        &self,
        state: &mut EnrichmentState,
        cancel: &CancellationToken,
    ) -> Result<Vec<EnrichedEvent>, EngineError> {
        let user_id = state.payload.user_id.clone();

        self.inject_metadata(state);

        // Fit artifact is best-effort: the event ships without it when
        // serialization or upload fails.
        let title = state.activity.name.clone();
        let mut fit_file_uri = String::new();
        match fitfile::encode(&state.activity, &title) {
            Ok(bytes) => {
                let path = paths::fit_blob(&user_id, &state.activity_id);
                match self.blob.put_path(&path, bytes.into()).await {
                    Ok(uri) => fit_file_uri = uri,
                    Err(e) => warn!(error = %e, "fit artifact upload failed"),
                }
            }
            Err(e) => warn!(error = %e, "fit artifact serialization failed"),
        }

        let description = state.slots.compose();

        // With no destinations there is nothing for uploaders to roll
        // up; the run finishes here.
        let final_status = if state.pipeline.destinations.is_empty() {
            if state.applied.is_empty() {
                PipelineRunStatus::Skipped
            } else {
                PipelineRunStatus::Synced
            }
        } else {
            PipelineRunStatus::Running
        };

        let start_time = state.activity.session().and_then(|s| s.start_time);
        self.runs
            .finalize(
                &user_id,
                &state.execution_id,
                &title,
                &description,
                state.activity.activity_type,
                start_time,
                final_status,
                &state.trace,
                &state.original_payload_uri,
            )
            .await?;

        let events = split_events(state, &title, &description, &fit_file_uri);
        debug!(events = events.len(), "fan-out assembled");

        for event in &events {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let data = serde_json::to_vec(event)
                .map_err(|e| EngineError::Config(format!("encode enriched event: {e}")))?;
            let mut attributes = HashMap::new();
            attributes.insert("user_id".to_string(), user_id.clone());
            attributes.insert(
                "pipeline_execution_id".to_string(),
                state.execution_id.clone(),
            );
            self.publisher
                .publish(topics::ENRICHED_ACTIVITY, &data, &attributes)
                .await?;
        }

        Ok(events)
    }

    /// Same-source flags plus source and per-destination config
    /// injection, with user plugin defaults as fallback.
    fn inject_metadata(&self, state: &mut EnrichmentState) {
        let source_key = normalize_source_key(&state.pipeline.source);

        for destination in &state.pipeline.destinations {
            if destination.short_name() == source_key {
                // The uploader must overwrite rather than section-merge
                // when the platform round-trips into itself.
                state.metadata.insert(
                    format!("same_source_destination_{}", destination.short_name()),
                    "true".to_string(),
                );
            }
        }

        let source_config = if state.pipeline.source_config.is_empty() {
            state.user.integration_config(&source_key)
        } else {
            state.pipeline.source_config.clone()
        };
        for (k, v) in sorted(source_config) {
            state.metadata.insert(k, v);
        }

        for destination in &state.pipeline.destinations {
            let config = match state.pipeline.settings_for(destination) {
                Some(settings) => settings.config.clone(),
                None => state.user.integration_config(&destination.short_name()),
            };
            for (k, v) in sorted(config) {
                state
                    .metadata
                    .insert(format!("{}_{}", destination.short_name(), k), v);
            }
        }
    }
}

fn sorted(map: HashMap<String, String>) -> BTreeMap<String, String> {
    map.into_iter().collect()
}

/// Lowercase, `source_`-prefix-stripped key for a pipeline source
/// string (accepts `strava`, `SOURCE_STRAVA`, ...).
fn normalize_source_key(source: &str) -> String {
    let lower = source.trim().to_ascii_lowercase();
    lower
        .strip_prefix("source_")
        .unwrap_or(&lower)
        .to_string()
}

/// Group destinations by their exclusion set and emit one event per
/// group. Destination sets across events are pairwise disjoint and
/// union to the pipeline's destinations.
pub(crate) fn split_events(
    state: &EnrichmentState,
    title: &str,
    description: &str,
    fit_file_uri: &str,
) -> Vec<EnrichedEvent> {
    let all_applied: Vec<String> = state.applied.iter().map(|(_, s)| s.clone()).collect();

    let mut groups: IndexMap<String, (HashSet<String>, Vec<Destination>)> = IndexMap::new();
    for destination in &state.pipeline.destinations {
        let excluded: BTreeSet<String> = state
            .pipeline
            .settings_for(destination)
            .map(|s| s.excluded_enrichers.iter().cloned().collect())
            .unwrap_or_default();
        let key = excluded.iter().cloned().collect::<Vec<_>>().join(",");
        let entry = groups
            .entry(key)
            .or_insert_with(|| (excluded.into_iter().collect(), Vec::new()));
        entry.1.push(*destination);
    }

    let start_time = state.activity.session().and_then(|s| s.start_time);
    groups
        .into_iter()
        .map(|(_, (excluded, destinations))| {
            let (event_description, applied) = if excluded.is_empty() {
                (description.to_string(), all_applied.clone())
            } else {
                (
                    state.slots.compose_excluding(&excluded),
                    state
                        .applied
                        .iter()
                        .filter(|(t, _)| !excluded.contains(t.as_str_name()))
                        .map(|(_, s)| s.clone())
                        .collect(),
                )
            };
            EnrichedEvent {
                user_id: state.payload.user_id.clone(),
                source: state.payload.source,
                activity_id: state.activity_id.clone(),
                activity: state.activity.clone(),
                title: title.to_string(),
                description: event_description,
                activity_type: state.activity.activity_type,
                applied_enrichments: applied,
                enrichment_metadata: state.metadata.clone(),
                destinations,
                pipeline_id: state.pipeline.id.clone(),
                pipeline_execution_id: state.execution_id.clone(),
                start_time,
                fit_file_uri: fit_file_uri.to_string(),
                use_update_method: state.payload.use_update_method,
            }
        })
        .collect()
}

//! End-to-end orchestrator scenarios against in-memory gateways.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use fitglue_core::{
    ActivityPayload, Destination, DestinationSettings, EnricherEntry, EnrichmentResult,
    FixedClock, PendingInput, PendingInputStatus, PipelineConfig, PipelineRunStatus,
    ProviderType, SequenceIds, Session, Source, StandardizedActivity,
};
use fitglue_engine::{
    EngineError, EnrichmentHandler, HandleOutcome, Orchestrator, ProcessResult, ProcessStatus,
};
use fitglue_notify::{MemorySender, PushSender};
use fitglue_provider::{
    EnricherProvider, MockProvider, ProviderRegistry, WaitForInputRequest,
};
use fitglue_queue::{topics, MemoryPublisher, Publisher, PushEnvelope};
use fitglue_storage::{BlobStore, DocumentStore, MemoryBlobStore, MemoryStore};

const NOW: &str = "2025-06-15T12:00:00Z";

struct Harness {
    store: Arc<MemoryStore>,
    blob: Arc<MemoryBlobStore>,
    publisher: Arc<MemoryPublisher>,
    sender: Arc<MemorySender>,
    clock: Arc<FixedClock>,
    orchestrator: Arc<Orchestrator>,
}

impl Harness {
    fn new(providers: Vec<Arc<dyn EnricherProvider>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let blob = Arc::new(MemoryBlobStore::new("fitglue-test"));
        let publisher = Arc::new(MemoryPublisher::new());
        let sender = Arc::new(MemorySender::new());
        let clock = Arc::new(FixedClock::new(NOW.parse().unwrap()));

        let mut builder = ProviderRegistry::builder();
        for provider in providers {
            builder = builder.register(provider);
        }

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(builder.build()),
            store.clone() as Arc<dyn DocumentStore>,
            blob.clone() as Arc<dyn BlobStore>,
            publisher.clone() as Arc<dyn Publisher>,
            Some(sender.clone() as Arc<dyn PushSender>),
            clock.clone(),
            Arc::new(SequenceIds::new("id")),
        ));

        Self {
            store,
            blob,
            publisher,
            sender,
            clock,
            orchestrator,
        }
    }

    async fn seed_user(&self, user: serde_json::Value) {
        let id = user["user_id"].as_str().unwrap().to_string();
        self.store
            .set(&format!("users/{id}"), user)
            .await
            .unwrap();
    }

    async fn seed_pipeline(&self, user_id: &str, pipeline: &PipelineConfig) {
        self.store
            .set(
                &format!("users/{user_id}/pipelines/{}", pipeline.id),
                serde_json::to_value(pipeline).unwrap(),
            )
            .await
            .unwrap();
    }

    async fn process(&self, payload: ActivityPayload) -> Result<ProcessResult, EngineError> {
        self.orchestrator
            .process(payload, None, None, false, &CancellationToken::new())
            .await
    }

    async fn run_status(&self, user_id: &str, execution_id: &str) -> (i64, Option<String>) {
        let doc = self
            .store
            .get(&format!("users/{user_id}/pipeline_runs/{execution_id}"))
            .await
            .unwrap()
            .expect("run document");
        (
            doc["status"].as_i64().unwrap(),
            doc["status_message"].as_str().map(str::to_string),
        )
    }
}

fn pro_user(user_id: &str) -> serde_json::Value {
    json!({
        "user_id": user_id,
        "tier": "pro",
        "fcm_tokens": ["tok-1"],
    })
}

fn activity(name: &str, elapsed: f64) -> StandardizedActivity {
    StandardizedActivity {
        name: name.into(),
        external_id: "ext-1".into(),
        source: Source::GarminConnect,
        sessions: vec![Session {
            start_time: Some("2025-06-15T06:00:00Z".parse().unwrap()),
            total_elapsed_time: elapsed,
            ..Session::default()
        }],
        ..StandardizedActivity::default()
    }
}

fn payload(user_id: &str, pipeline_id: &str, activity: StandardizedActivity) -> ActivityPayload {
    ActivityPayload {
        user_id: user_id.into(),
        source: Source::GarminConnect,
        pipeline_id: pipeline_id.into(),
        standardized_activity: Some(activity),
        ..ActivityPayload::default()
    }
}

fn pipeline(id: &str, enrichers: Vec<EnricherEntry>, destinations: Vec<Destination>) -> PipelineConfig {
    PipelineConfig {
        id: id.into(),
        source: "garmin_connect".into(),
        enrichers,
        destinations,
        ..PipelineConfig::default()
    }
}

fn mock_entry() -> EnricherEntry {
    EnricherEntry {
        provider: ProviderType::Mock,
        config: HashMap::new(),
    }
}

// ── Scenario 1: single pipeline, single provider, success ───────────

#[tokio::test]
async fn single_provider_success() {
    let mock = Arc::new(MockProvider::with_result(
        "mock",
        ProviderType::Mock,
        EnrichmentResult {
            name: "Enriched".into(),
            description: "Added".into(),
            metadata: [("processed_by".to_string(), "mock".to_string())]
                .into_iter()
                .collect(),
            ..EnrichmentResult::default()
        },
    ));
    let h = Harness::new(vec![mock.clone()]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let result = h
        .process(payload("u1", "p1", activity("Original Run", 60.0)))
        .await
        .unwrap();

    assert_eq!(result.status, ProcessStatus::Success);
    assert_eq!(result.events.len(), 1);
    let event = &result.events[0];
    assert_eq!(event.title, "Enriched");
    assert_eq!(event.description, "Added");
    assert_eq!(event.destinations, vec![Destination::Strava]);
    assert!(event
        .applied_enrichments
        .contains(&"MOCK".to_string()));
    assert_eq!(
        event.enrichment_metadata.get("processed_by").map(String::as_str),
        Some("mock")
    );
    assert_eq!(event.pipeline_execution_id, result.pipeline_execution_id);

    // Run finalized back to RUNNING until the uploader reports.
    let (status, message) = h.run_status("u1", &result.pipeline_execution_id).await;
    assert_eq!(status, PipelineRunStatus::Running.code() as i64);
    assert!(message.is_none());

    // One PENDING outcome per destination.
    let outcomes = h
        .store
        .list(&format!(
            "users/u1/pipeline_runs/{}/destination_outcomes",
            result.pipeline_execution_id
        ))
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].0, Destination::Strava.doc_id());

    // Event published to the enriched-activity topic.
    let published = h.publisher.published_to(topics::ENRICHED_ACTIVITY).await;
    assert_eq!(published.len(), 1);

    // Original payload snapshot landed in blob storage.
    let run_doc = h
        .store
        .get(&format!(
            "users/u1/pipeline_runs/{}",
            result.pipeline_execution_id
        ))
        .await
        .unwrap()
        .unwrap();
    let uri = run_doc["original_payload_uri"].as_str().unwrap();
    assert!(uri.starts_with("gs://fitglue-test/payloads/u1/"));
    assert!(h.blob.get(uri).await.is_ok());
}

// ── Scenario 2: multi-pipeline isolation ────────────────────────────

fn echo_pipeline_id(
    _: &StandardizedActivity,
    _: &fitglue_core::UserRecord,
    config: &fitglue_provider::ProviderConfig,
) -> Result<EnrichmentResult, fitglue_provider::ProviderError> {
    Ok(EnrichmentResult {
        description: format!("from {}", config.get("pipeline_id").unwrap_or_default()),
        ..EnrichmentResult::default()
    })
}

#[tokio::test]
async fn pipelines_are_isolated_per_invocation() {
    let h = Harness::new(vec![Arc::new(MockProvider::new(
        "mock",
        ProviderType::Mock,
        echo_pipeline_id,
    ))]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline("u1", &pipeline("A", vec![mock_entry()], vec![Destination::Strava]))
        .await;
    h.seed_pipeline("u1", &pipeline("B", vec![mock_entry()], vec![Destination::Hevy]))
        .await;

    let a = h
        .process(payload("u1", "A", activity("Run", 60.0)))
        .await
        .unwrap();
    let b = h
        .process(payload("u1", "B", activity("Run", 60.0)))
        .await
        .unwrap();

    assert_eq!(a.events[0].description, "from A");
    assert_eq!(b.events[0].description, "from B");
    assert_ne!(a.pipeline_execution_id, b.pipeline_execution_id);
    assert!(a.pipeline_execution_id.contains("A"));
    assert!(b.pipeline_execution_id.contains("B"));
}

// ── Scenario 3: stream aggregation ──────────────────────────────────

#[tokio::test]
async fn stream_aggregation_expands_records() {
    let mock = Arc::new(MockProvider::with_result(
        "mock",
        ProviderType::Mock,
        EnrichmentResult {
            heart_rate_stream: vec![100.0, 110.0, 120.0],
            ..EnrichmentResult::default()
        },
    ));
    let h = Harness::new(vec![mock]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let result = h
        .process(payload("u1", "p1", activity("Run", 3.0)))
        .await
        .unwrap();

    let session = &result.events[0].activity.sessions[0];
    assert_eq!(session.laps.len(), 1);
    let hr: Vec<f64> = session.laps[0]
        .records
        .iter()
        .map(|r| r.heart_rate.unwrap())
        .collect();
    assert_eq!(hr, vec![100.0, 110.0, 120.0]);
}

// ── Scenario 4: tier block ──────────────────────────────────────────

#[tokio::test]
async fn over_quota_user_is_tier_blocked() {
    let h = Harness::new(vec![Arc::new(MockProvider::succeeding())]);
    h.seed_user(json!({
        "user_id": "u1",
        "tier": "free",
        "sync_count_this_month": 10,
        "sync_count_reset_at": "2025-06-01T00:00:00Z",
        "prevented_sync_count": 0,
    }))
    .await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let result = h
        .process(payload("u1", "p1", activity("Run", 60.0)))
        .await
        .unwrap();

    assert_eq!(result.status, ProcessStatus::Skipped);
    assert!(result.events.is_empty());

    let user = h.store.get("users/u1").await.unwrap().unwrap();
    assert_eq!(user["prevented_sync_count"].as_i64().unwrap(), 1);

    let runs = h.store.list("users/u1/pipeline_runs").await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(
        runs[0].1["status"].as_i64().unwrap(),
        PipelineRunStatus::TierBlocked.code() as i64
    );
}

#[tokio::test]
async fn new_month_resets_quota() {
    let mock = Arc::new(MockProvider::succeeding());
    let h = Harness::new(vec![mock]);
    h.seed_user(json!({
        "user_id": "u1",
        "tier": "free",
        "sync_count_this_month": 10,
        "sync_count_reset_at": "2025-05-01T00:00:00Z",
    }))
    .await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    // Counter is from May; the clock says June 15th.
    let result = h
        .process(payload("u1", "p1", activity("Run", 60.0)))
        .await
        .unwrap();
    assert_eq!(result.status, ProcessStatus::Success);

    let user = h.store.get("users/u1").await.unwrap().unwrap();
    // Reset to zero, then incremented for this accepted sync.
    assert_eq!(user["sync_count_this_month"].as_i64().unwrap(), 1);
}

// ── Scenario 5: wait for user input ─────────────────────────────────

#[tokio::test]
async fn wait_for_input_parks_the_run() {
    let waiting = Arc::new(MockProvider::waiting(
        "parkrun-results",
        ProviderType::ParkrunResults,
        WaitForInputRequest {
            activity_id: "ext-1".into(),
            required_fields: vec!["description".into(), "position".into()],
            metadata: [(
                "display.summary".to_string(),
                "Waiting for Parkrun results".to_string(),
            )]
            .into_iter()
            .collect(),
            enricher_provider_id: "parkrun-results".into(),
        },
    ));
    let h = Harness::new(vec![waiting]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline(
            "p1",
            vec![EnricherEntry {
                provider: ProviderType::ParkrunResults,
                config: HashMap::new(),
            }],
            vec![Destination::Strava],
        ),
    )
    .await;

    let result = h
        .process(payload("u1", "p1", activity("Parkrun", 1500.0)))
        .await
        .unwrap();

    assert_eq!(result.status, ProcessStatus::Waiting);
    assert!(result.events.is_empty());

    let (status, message) = h.run_status("u1", &result.pipeline_execution_id).await;
    assert_eq!(status, PipelineRunStatus::Pending.code() as i64);
    assert_eq!(
        message.as_deref(),
        Some("Waiting for user input: Waiting for Parkrun results")
    );

    let inputs = h.store.list("users/u1/pending_inputs").await.unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].1["status"].as_str().unwrap(), "WAITING");
    assert_eq!(
        inputs[0].1["required_fields"],
        json!(["description", "position"])
    );

    assert_eq!(h.sender.sent_count().await, 1);
    let sent = h.sender.sent().await;
    assert_eq!(sent[0].message.title, "Input needed");
}

// ── Scenario 6: destination exclusion fan-out ───────────────────────

#[tokio::test]
async fn exclusion_groups_fan_out_into_variants() {
    let heatmap = Arc::new(MockProvider::with_result(
        "muscle-heatmap",
        ProviderType::MuscleHeatmap,
        EnrichmentResult {
            description: "Muscle heatmap: quads".into(),
            ..EnrichmentResult::default()
        },
    ));
    let h = Harness::new(vec![heatmap]);
    h.seed_user(pro_user("u1")).await;

    let mut config = pipeline(
        "p1",
        vec![EnricherEntry {
            provider: ProviderType::MuscleHeatmap,
            config: HashMap::new(),
        }],
        vec![Destination::Strava, Destination::Hevy],
    );
    config.destination_configs.insert(
        "hevy".into(),
        DestinationSettings {
            config: HashMap::new(),
            excluded_enrichers: vec!["MUSCLE_HEATMAP".into()],
        },
    );
    h.seed_pipeline("u1", &config).await;

    let mut activity = activity("Lift", 1800.0);
    activity.description = "Leg day".into();
    let result = h.process(payload("u1", "p1", activity)).await.unwrap();

    assert_eq!(result.events.len(), 2);
    let strava = result
        .events
        .iter()
        .find(|e| e.destinations == vec![Destination::Strava])
        .expect("strava event");
    let hevy = result
        .events
        .iter()
        .find(|e| e.destinations == vec![Destination::Hevy])
        .expect("hevy event");

    assert_eq!(strava.description, "Leg day\n\nMuscle heatmap: quads");
    assert!(strava
        .applied_enrichments
        .contains(&"MUSCLE_HEATMAP".to_string()));

    assert_eq!(hevy.description, "Leg day");
    assert!(!hevy
        .applied_enrichments
        .contains(&"MUSCLE_HEATMAP".to_string()));

    // Same invocation, disjoint destination sets.
    assert_eq!(strava.pipeline_execution_id, hevy.pipeline_execution_id);

    // One publish per variant.
    let published = h.publisher.published_to(topics::ENRICHED_ACTIVITY).await;
    assert_eq!(published.len(), 2);
}

// ── Deferral: phase 2 sees the phase-1 composition ──────────────────

#[tokio::test]
async fn deferred_provider_gets_phase1_description_and_keeps_slot_order() {
    let summary = Arc::new(
        MockProvider::new(
            "ai-summary",
            ProviderType::AiSummary,
            |_, _, config| {
                let phase1 = config.enriched_description().unwrap_or_default();
                assert!(phase1.contains("12C, light rain"));
                Ok(EnrichmentResult {
                    description: "A rainy little run.".into(),
                    ..EnrichmentResult::default()
                })
            },
        )
        .deferring(),
    );
    let weather = Arc::new(MockProvider::with_result(
        "weather",
        ProviderType::Weather,
        EnrichmentResult {
            description: "12C, light rain".into(),
            ..EnrichmentResult::default()
        },
    ));
    let h = Harness::new(vec![summary, weather]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline(
            "p1",
            vec![
                EnricherEntry {
                    provider: ProviderType::AiSummary,
                    config: HashMap::new(),
                },
                EnricherEntry {
                    provider: ProviderType::Weather,
                    config: HashMap::new(),
                },
            ],
            vec![Destination::Strava],
        ),
    )
    .await;

    let result = h
        .process(payload("u1", "p1", activity("Run", 60.0)))
        .await
        .unwrap();

    // The deferred summary ran second but its configured slot is
    // first.
    assert_eq!(
        result.events[0].description,
        "A rainy little run.\n\n12C, light rain"
    );
}

// ── Halt ────────────────────────────────────────────────────────────

#[tokio::test]
async fn halting_provider_skips_the_run() {
    let halting = Arc::new(MockProvider::with_result(
        "mock",
        ProviderType::Mock,
        EnrichmentResult {
            halt_pipeline: true,
            halt_reason: "duplicate activity".into(),
            ..EnrichmentResult::default()
        },
    ));
    let h = Harness::new(vec![halting]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let result = h
        .process(payload("u1", "p1", activity("Run", 60.0)))
        .await
        .unwrap();

    assert_eq!(result.status, ProcessStatus::Skipped);
    assert!(result.events.is_empty());
    let (status, message) = h.run_status("u1", &result.pipeline_execution_id).await;
    assert_eq!(status, PipelineRunStatus::Skipped.code() as i64);
    assert_eq!(
        message.as_deref(),
        Some("Pipeline halted: duplicate activity")
    );
}

// ── Provider failure ────────────────────────────────────────────────

#[tokio::test]
async fn provider_failure_fails_the_run_and_notifies() {
    let failing = Arc::new(MockProvider::failing(
        "mock",
        ProviderType::Mock,
        "upstream exploded",
    ));
    let h = Harness::new(vec![failing]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let err = h
        .process(payload("u1", "p1", activity("Run", 60.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Provider { .. }));

    let runs = h.store.list("users/u1/pipeline_runs").await.unwrap();
    assert_eq!(
        runs[0].1["status"].as_i64().unwrap(),
        PipelineRunStatus::Failed.code() as i64
    );
    assert_eq!(h.sender.sent_count().await, 1);
}

// ── Validation & skip paths ─────────────────────────────────────────

#[tokio::test]
async fn missing_pipeline_id_is_a_config_error() {
    let h = Harness::new(vec![]);
    let mut p = payload("u1", "", activity("Run", 60.0));
    p.pipeline_id = String::new();
    assert!(matches!(
        h.process(p).await.unwrap_err(),
        EngineError::Config(_)
    ));
}

#[tokio::test]
async fn invalid_sessions_are_validation_errors() {
    let h = Harness::new(vec![]);
    h.seed_user(pro_user("u1")).await;

    let mut no_session = activity("Run", 60.0);
    no_session.sessions.clear();
    assert!(matches!(
        h.process(payload("u1", "p1", no_session)).await.unwrap_err(),
        EngineError::Validation(_)
    ));

    let zero_elapsed = activity("Run", 0.0);
    assert!(matches!(
        h.process(payload("u1", "p1", zero_elapsed)).await.unwrap_err(),
        EngineError::Validation(_)
    ));
}

#[tokio::test]
async fn unknown_or_disabled_pipeline_skips_without_error() {
    let h = Harness::new(vec![]);
    h.seed_user(pro_user("u1")).await;

    let result = h
        .process(payload("u1", "nope", activity("Run", 60.0)))
        .await
        .unwrap();
    assert_eq!(result.status, ProcessStatus::Skipped);
    assert!(result.events.is_empty());

    let mut disabled = pipeline("p1", vec![], vec![Destination::Strava]);
    disabled.disabled = true;
    h.seed_pipeline("u1", &disabled).await;
    let result = h
        .process(payload("u1", "p1", activity("Run", 60.0)))
        .await
        .unwrap();
    assert_eq!(result.status, ProcessStatus::Skipped);
}

// ── Zero destinations ───────────────────────────────────────────────

#[tokio::test]
async fn zero_destinations_finishes_synced_with_no_events() {
    let mock = Arc::new(MockProvider::with_result(
        "mock",
        ProviderType::Mock,
        EnrichmentResult {
            description: "Added".into(),
            ..EnrichmentResult::default()
        },
    ));
    let h = Harness::new(vec![mock]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline("u1", &pipeline("p1", vec![mock_entry()], vec![])).await;

    let result = h
        .process(payload("u1", "p1", activity("Run", 60.0)))
        .await
        .unwrap();
    assert_eq!(result.status, ProcessStatus::Success);
    assert!(result.events.is_empty());

    let (status, _) = h.run_status("u1", &result.pipeline_execution_id).await;
    assert_eq!(status, PipelineRunStatus::Synced.code() as i64);
}

// ── Branding for free tier ──────────────────────────────────────────

#[tokio::test]
async fn free_tier_gets_branding_appended() {
    let mock = Arc::new(MockProvider::with_result(
        "mock",
        ProviderType::Mock,
        EnrichmentResult {
            description: "Added".into(),
            ..EnrichmentResult::default()
        },
    ));
    let branding = Arc::new(fitglue_provider::BrandingProvider::new(
        "Synced with FitGlue",
    ));
    let h = Harness::new(vec![mock, branding]);
    h.seed_user(json!({"user_id": "u1", "tier": "free"})).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let result = h
        .process(payload("u1", "p1", activity("Run", 60.0)))
        .await
        .unwrap();
    assert_eq!(
        result.events[0].description,
        "Added\n\nSynced with FitGlue"
    );
    assert!(result.events[0]
        .applied_enrichments
        .contains(&"branding".to_string()));
}

// ── Resume with completed pending input ─────────────────────────────

#[tokio::test]
async fn resume_uses_completed_pending_input() {
    let parkrun = Arc::new(
        MockProvider::new("parkrun-results", ProviderType::ParkrunResults, |_, _, _| {
            panic!("normal enrich must not run on resume with completed input")
        })
        .resumable_with(|_, _, input| {
            Ok(EnrichmentResult {
                description: format!(
                    "Finished P{}",
                    input.input_data.get("position").unwrap()
                ),
                ..EnrichmentResult::default()
            })
        }),
    );
    let h = Harness::new(vec![parkrun.clone()]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline(
            "p1",
            vec![EnricherEntry {
                provider: ProviderType::ParkrunResults,
                config: HashMap::new(),
            }],
            vec![Destination::Strava],
        ),
    )
    .await;

    let input = PendingInput {
        id: "pi-1".into(),
        user_id: "u1".into(),
        status: PendingInputStatus::Completed,
        enricher_provider_id: "parkrun-results".into(),
        pipeline_id: "p1".into(),
        linked_activity_id: "a-9".into(),
        input_data: [("position".to_string(), "42".to_string())]
            .into_iter()
            .collect(),
        ..PendingInput::default()
    };
    h.store
        .set(
            "users/u1/pending_inputs/pi-1",
            serde_json::to_value(&input).unwrap(),
        )
        .await
        .unwrap();

    let mut p = payload("u1", "p1", activity("Parkrun", 1500.0));
    p.is_resume = true;
    p.activity_id = "a-9".into();
    p.resume_pending_input_id = "pi-1".into();
    p.resume_only_enrichers = vec!["parkrun-results".into()];

    let result = h.process(p).await.unwrap();
    assert_eq!(result.status, ProcessStatus::Success);
    assert_eq!(result.events[0].description, "Finished P42");
    assert_eq!(result.events[0].activity_id, "a-9");
    assert!(parkrun.calls()[0].resumed);
}

#[tokio::test]
async fn resume_without_activity_id_is_rejected() {
    let h = Harness::new(vec![]);
    h.seed_user(pro_user("u1")).await;
    let mut p = payload("u1", "p1", activity("Run", 60.0));
    p.is_resume = true;
    assert!(matches!(
        h.process(p).await.unwrap_err(),
        EngineError::Config(_)
    ));
}

#[tokio::test]
async fn resume_list_skips_other_providers() {
    let weather = Arc::new(MockProvider::with_result(
        "weather",
        ProviderType::Weather,
        EnrichmentResult {
            description: "should not appear".into(),
            ..EnrichmentResult::default()
        },
    ));
    let mock = Arc::new(MockProvider::with_result(
        "mock",
        ProviderType::Mock,
        EnrichmentResult {
            description: "resumed".into(),
            ..EnrichmentResult::default()
        },
    ));
    let h = Harness::new(vec![weather.clone(), mock]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline(
            "p1",
            vec![
                EnricherEntry {
                    provider: ProviderType::Weather,
                    config: HashMap::new(),
                },
                mock_entry(),
            ],
            vec![Destination::Strava],
        ),
    )
    .await;

    let mut p = payload("u1", "p1", activity("Run", 60.0));
    p.is_resume = true;
    p.activity_id = "a-1".into();
    p.resume_only_enrichers = vec!["mock".into()];

    let result = h.process(p).await.unwrap();
    assert_eq!(result.events[0].description, "resumed");
    assert_eq!(weather.call_count(), 0);

    // The skipped provider is traced with its reason.
    let skipped = result
        .provider_executions
        .iter()
        .find(|e| e.provider_name == "weather")
        .unwrap();
    assert_eq!(
        skipped.metadata.get("reason").map(String::as_str),
        Some("not_in_resume_list")
    );
}

// ── Framing: lag offload and loop break ─────────────────────────────

fn handler_for(h: &Harness) -> EnrichmentHandler {
    EnrichmentHandler::new(
        h.orchestrator.clone(),
        h.publisher.clone() as Arc<dyn Publisher>,
        h.clock.clone(),
        15,
    )
}

#[tokio::test]
async fn retryable_error_offloads_to_lag_queue_once() {
    let lagging = Arc::new(MockProvider::retryable(
        "mock",
        ProviderType::Mock,
        "results not published yet",
        None,
    ));
    let h = Harness::new(vec![lagging]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let handler = handler_for(&h);
    let body = serde_json::to_vec(&payload("u1", "p1", activity("Run", 60.0))).unwrap();
    let envelope = PushEnvelope::wrap(&body, HashMap::new(), Some(NOW.parse().unwrap()));

    let outcome = handler
        .handle(&envelope, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, HandleOutcome::Lagged));

    // One lag publish, zero enriched publishes.
    let lagged = h.publisher.published_to(topics::ENRICHMENT_LAG).await;
    assert_eq!(lagged.len(), 1);
    assert_eq!(
        lagged[0].attributes.get("origin").map(String::as_str),
        Some("lag-queue")
    );
    assert_eq!(lagged[0].data, body);
    assert!(h
        .publisher
        .published_to(topics::ENRICHED_ACTIVITY)
        .await
        .is_empty());
}

#[tokio::test]
async fn lag_tagged_envelope_surfaces_retry_to_broker() {
    let lagging = Arc::new(MockProvider::retryable(
        "mock",
        ProviderType::Mock,
        "still not ready",
        None,
    ));
    let h = Harness::new(vec![lagging]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let handler = handler_for(&h);
    let body = serde_json::to_vec(&payload("u1", "p1", activity("Run", 60.0))).unwrap();
    let attrs: HashMap<String, String> =
        [("origin".to_string(), "lag-queue".to_string())].into_iter().collect();
    let envelope = PushEnvelope::wrap(&body, attrs, Some(NOW.parse().unwrap()));

    let err = handler
        .handle(&envelope, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Retryable { .. }));
    assert!(h
        .publisher
        .published_to(topics::ENRICHMENT_LAG)
        .await
        .is_empty());
}

#[tokio::test]
async fn stale_envelope_forces_do_not_retry() {
    let mock = Arc::new(MockProvider::succeeding());
    let h = Harness::new(vec![mock.clone()]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let handler = handler_for(&h);
    let body = serde_json::to_vec(&payload("u1", "p1", activity("Run", 60.0))).unwrap();
    // Published 20 minutes before the fixed clock's now.
    let envelope = PushEnvelope::wrap(
        &body,
        HashMap::new(),
        Some("2025-06-15T11:40:00Z".parse().unwrap()),
    );

    handler
        .handle(&envelope, &CancellationToken::new())
        .await
        .unwrap();
    assert!(mock.calls()[0].do_not_retry);
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_invocation_fails_the_run() {
    let mock = Arc::new(MockProvider::succeeding());
    let h = Harness::new(vec![mock]);
    h.seed_user(pro_user("u1")).await;
    h.seed_pipeline(
        "u1",
        &pipeline("p1", vec![mock_entry()], vec![Destination::Strava]),
    )
    .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = h
        .orchestrator
        .process(
            payload("u1", "p1", activity("Run", 60.0)),
            None,
            None,
            false,
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
}

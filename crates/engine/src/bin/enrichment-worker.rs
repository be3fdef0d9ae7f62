//! enrichment-worker — serves the enrichment push endpoint.
//!
//! Receives broker push envelopes on `POST /push`, runs them through
//! the framing wrapper and orchestrator, and answers with the ack
//! semantics the broker expects: 2xx acknowledges, anything else
//! redelivers per subscription policy.
//!
//! The default wiring is the local development stack (in-memory
//! document store and publisher, local blob directory, mock + branding
//! providers); production deployments swap the gateways at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fitglue_core::config::{load_dotenv, Config};
use fitglue_core::{SystemClock, UuidSource};
use fitglue_engine::{EngineError, EnrichmentHandler, HandleOutcome, Orchestrator};
use fitglue_notify::{FcmSender, PushSender};
use fitglue_provider::{BrandingProvider, MockProvider, ProviderRegistry, ProviderServices};
use fitglue_queue::{MemoryPublisher, Publisher, PushEnvelope};
use fitglue_storage::{
    BlobStore, DocumentStore, GcsBlobStore, LocalBlobStore, MemoryStore, RetryingStore,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// FitGlue enrichment worker — consumes targeted activity messages.
#[derive(Parser, Debug)]
#[command(name = "enrichment-worker", version, about)]
struct Cli {
    /// Listen address for the push endpoint.
    #[arg(long, env = "ENRICHMENT_ADDR", default_value = "0.0.0.0:8080")]
    addr: SocketAddr,
}

struct AppState {
    handler: EnrichmentHandler,
    cancel: CancellationToken,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();

    let clock = Arc::new(SystemClock);
    let ids = Arc::new(UuidSource);

    let store: Arc<dyn DocumentStore> = Arc::new(RetryingStore::new(
        MemoryStore::new(),
        config.engine.storage_retry_attempts,
    ));

    let blob: Arc<dyn BlobStore> = match &config.gcp.local_blob_dir {
        Some(dir) => Arc::new(LocalBlobStore::new(
            &PathBuf::from(dir),
            &config.gcp.payload_bucket,
        )?),
        None => Arc::new(GcsBlobStore::new(&config.gcp.payload_bucket)?),
    };

    let publisher: Arc<dyn Publisher> = Arc::new(MemoryPublisher::new());

    let notifier: Option<Arc<dyn PushSender>> = config.notify.fcm_server_key.as_ref().map(|key| {
        Arc::new(FcmSender::new(config.notify.fcm_endpoint.clone(), key.clone()))
            as Arc<dyn PushSender>
    });

    let registry = Arc::new(
        ProviderRegistry::builder()
            .services(ProviderServices { blob: blob.clone() })
            .register(Arc::new(MockProvider::succeeding()))
            .register(Arc::new(BrandingProvider::new(
                config.engine.branding_text.clone(),
            )))
            .build(),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        store,
        blob,
        publisher.clone(),
        notifier,
        clock.clone(),
        ids,
    ));
    let handler = EnrichmentHandler::new(
        orchestrator,
        publisher,
        clock,
        config.engine.lag_threshold_minutes,
    );

    let cancel = CancellationToken::new();
    let state = Arc::new(AppState {
        handler,
        cancel: cancel.clone(),
    });

    let app = Router::new()
        .route("/push", post(handle_push))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state);

    info!(addr = %cli.addr, "enrichment-worker starting");
    let listener = tokio::net::TcpListener::bind(cli.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            cancel.cancel();
        })
        .await?;
    info!("enrichment-worker exited cleanly");

    Ok(())
}

// ── Push endpoint ───────────────────────────────────────────────────

async fn handle_push(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    let envelope = match PushEnvelope::from_json(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "undecodable push body");
            return StatusCode::BAD_REQUEST;
        }
    };

    match state.handler.handle(&envelope, &state.cancel).await {
        Ok(HandleOutcome::Processed(result)) => {
            info!(
                execution_id = %result.pipeline_execution_id,
                status = ?result.status,
                events = result.events.len(),
                "message processed"
            );
            StatusCode::OK
        }
        Ok(HandleOutcome::Lagged) => StatusCode::OK,
        Err(e @ (EngineError::Config(_) | EngineError::Validation(_))) => {
            warn!(error = %e, "rejecting malformed message");
            StatusCode::BAD_REQUEST
        }
        Err(e) => {
            error!(error = %e, "enrichment failed, message will redeliver");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gcp: GcpConfig,
    pub engine: EngineSettings,
    pub notify: NotifySettings,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            gcp: GcpConfig::from_env(),
            engine: EngineSettings::from_env(),
            notify: NotifySettings::from_env(),
        }
    }
}

// ── GCP / storage ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    pub project_id: Option<String>,
    /// Bucket for payload snapshots and generated artifacts.
    pub payload_bucket: String,
    /// Local directory used instead of GCS when set (dev mode).
    pub local_blob_dir: Option<String>,
}

impl GcpConfig {
    pub fn from_env() -> Self {
        Self {
            project_id: env_opt("GCP_PROJECT_ID"),
            payload_bucket: env_or("PAYLOAD_BUCKET", "fitglue-payloads"),
            local_blob_dir: env_opt("LOCAL_BLOB_DIR"),
        }
    }
}

// ── Engine tuning ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Envelopes older than this many minutes run degraded (no
    /// retryable provider work).
    pub lag_threshold_minutes: u64,
    /// Bounded retry budget for transient storage errors.
    pub storage_retry_attempts: u32,
    /// Text the branding step appends for free-tier activities.
    pub branding_text: String,
}

impl EngineSettings {
    pub fn from_env() -> Self {
        Self {
            lag_threshold_minutes: env_u64("LAG_THRESHOLD_MINUTES", 15),
            storage_retry_attempts: env_u32("STORAGE_RETRY_ATTEMPTS", 3),
            branding_text: env_or("BRANDING_TEXT", "Synced with FitGlue - fitglue.app"),
        }
    }
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    pub fcm_endpoint: String,
    pub fcm_server_key: Option<String>,
}

impl NotifySettings {
    pub fn from_env() -> Self {
        Self {
            fcm_endpoint: env_or("FCM_ENDPOINT", "https://fcm.googleapis.com/fcm/send"),
            fcm_server_key: env_opt("FCM_SERVER_KEY"),
        }
    }
}

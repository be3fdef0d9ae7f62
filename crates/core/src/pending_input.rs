//! Pending user-input documents.
//!
//! When an enricher needs data only the user can supply (e.g. parkrun
//! finish position before results publish), the orchestrator parks the
//! run and writes one of these. The external inputs handler resolves
//! it; a resume message then re-enters the orchestrator.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::Source;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PendingInputStatus {
    #[default]
    Waiting,
    Completed,
    Expired,
}

impl PendingInputStatus {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            PendingInputStatus::Waiting => "WAITING",
            PendingInputStatus::Completed => "COMPLETED",
            PendingInputStatus::Expired => "EXPIRED",
        }
    }

    pub fn from_str_name(s: &str) -> Option<PendingInputStatus> {
        Some(match s.trim().to_ascii_uppercase().as_str() {
            "WAITING" => PendingInputStatus::Waiting,
            "COMPLETED" => PendingInputStatus::Completed,
            "EXPIRED" => PendingInputStatus::Expired,
            _ => return None,
        })
    }
}

impl From<PendingInputStatus> for String {
    fn from(s: PendingInputStatus) -> String {
        s.as_str_name().to_string()
    }
}

impl TryFrom<String> for PendingInputStatus {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PendingInputStatus::from_str_name(&s).ok_or_else(|| CoreError::UnknownEnum {
            kind: "PendingInputStatus",
            value: s,
        })
    }
}

/// Stable document ID for a pending input.
///
/// UUIDv5 over `(source, source external id, provider name)` so a
/// re-run of the same activity through the same provider addresses the
/// same document instead of stacking duplicates.
pub fn pending_input_id(source: Source, source_external_id: &str, provider_name: &str) -> String {
    let key = format!(
        "{}/{}/{}",
        source.as_str_name(),
        source_external_id,
        provider_name
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingInput {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub status: PendingInputStatus,
    /// Field names the user must supply, in display order.
    #[serde(default, alias = "requiredFields")]
    pub required_fields: Vec<String>,
    /// Provider name, also the collection-group scan key.
    #[serde(default, alias = "enricherProviderId")]
    pub enricher_provider_id: String,
    #[serde(default, alias = "pipelineId")]
    pub pipeline_id: String,
    /// The orchestrator-generated activity ID the resume re-attaches to.
    #[serde(default, alias = "linkedActivityId")]
    pub linked_activity_id: String,
    #[serde(default, alias = "originalPayloadUri")]
    pub original_payload_uri: String,
    /// Display hints (`display.summary`, `display.field_labels`) plus
    /// provider context needed on resume.
    #[serde(default, alias = "providerMetadata")]
    pub provider_metadata: HashMap<String, String>,
    /// Populated by the inputs handler on resolve.
    #[serde(default, alias = "inputData")]
    pub input_data: HashMap<String, String>,
    #[serde(default, alias = "autoDeadline")]
    pub auto_deadline: Option<DateTime<Utc>>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

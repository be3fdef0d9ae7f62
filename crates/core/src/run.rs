//! Pipeline run records.
//!
//! A run is created the moment the orchestrator accepts a message and
//! lives through RUNNING/PENDING into a terminal status. Destination
//! outcomes are a subcollection (source of truth for concurrent
//! uploader writes) mirrored into the run document for single-read UI
//! queries.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityType, Source};
use crate::error::CoreError;
use crate::pipeline::Destination;

/// Run roll-up status. Integer codes are wire-stable; the UI reads
/// them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum PipelineRunStatus {
    #[default]
    Running,
    Pending,
    Failed,
    Partial,
    Synced,
    Skipped,
    TierBlocked,
}

impl PipelineRunStatus {
    pub fn code(&self) -> i32 {
        match self {
            PipelineRunStatus::Running => 0,
            PipelineRunStatus::Pending => 1,
            PipelineRunStatus::Failed => 2,
            PipelineRunStatus::Partial => 3,
            PipelineRunStatus::Synced => 4,
            PipelineRunStatus::Skipped => 5,
            PipelineRunStatus::TierBlocked => 6,
        }
    }

    pub fn from_code(code: i32) -> Option<PipelineRunStatus> {
        Some(match code {
            0 => PipelineRunStatus::Running,
            1 => PipelineRunStatus::Pending,
            2 => PipelineRunStatus::Failed,
            3 => PipelineRunStatus::Partial,
            4 => PipelineRunStatus::Synced,
            5 => PipelineRunStatus::Skipped,
            6 => PipelineRunStatus::TierBlocked,
            _ => return None,
        })
    }

    /// Terminal statuses never change again except via admin repost.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineRunStatus::Running | PipelineRunStatus::Pending)
    }
}

impl From<PipelineRunStatus> for i32 {
    fn from(s: PipelineRunStatus) -> i32 {
        s.code()
    }
}

impl TryFrom<i32> for PipelineRunStatus {
    type Error = CoreError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        PipelineRunStatus::from_code(code).ok_or_else(|| CoreError::UnknownEnum {
            kind: "PipelineRunStatus",
            value: code.to_string(),
        })
    }
}

/// Per-destination leaf status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum DestinationStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Skipped,
}

impl DestinationStatus {
    pub fn code(&self) -> i32 {
        match self {
            DestinationStatus::Pending => 0,
            DestinationStatus::Success => 1,
            DestinationStatus::Failed => 2,
            DestinationStatus::Skipped => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<DestinationStatus> {
        Some(match code {
            0 => DestinationStatus::Pending,
            1 => DestinationStatus::Success,
            2 => DestinationStatus::Failed,
            3 => DestinationStatus::Skipped,
            _ => return None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DestinationStatus::Pending)
    }
}

impl From<DestinationStatus> for i32 {
    fn from(s: DestinationStatus) -> i32 {
        s.code()
    }
}

impl TryFrom<i32> for DestinationStatus {
    type Error = CoreError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        DestinationStatus::from_code(code).ok_or_else(|| CoreError::UnknownEnum {
            kind: "DestinationStatus",
            value: code.to_string(),
        })
    }
}

/// One destination's outcome document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationOutcome {
    pub destination: Destination,
    #[serde(default)]
    pub status: DestinationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DestinationOutcome {
    pub fn pending(destination: Destination) -> Self {
        Self {
            destination,
            status: DestinationStatus::Pending,
            external_id: None,
            error: None,
            completed_at: None,
            updated_at: None,
        }
    }
}

/// Execution status of one provider call in the booster trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderExecutionStatus {
    Started,
    Success,
    Failed,
    Skipped,
    Retry,
    Waiting,
}

/// One row of the booster trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderExecution {
    pub provider_name: String,
    pub execution_id: String,
    pub status: ProviderExecutionStatus,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, String>,
}

/// The materialized record of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Equals the pipeline-execution ID.
    pub id: String,
    pub pipeline_id: String,
    pub activity_id: String,
    pub source: Source,
    #[serde(default)]
    pub source_activity_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub status: PipelineRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Inline mirror of the outcomes subcollection.
    #[serde(default)]
    pub destinations: Vec<DestinationOutcome>,
    /// Inline provider-execution trace.
    #[serde(default)]
    pub boosters: Vec<ProviderExecution>,
    #[serde(default)]
    pub original_payload_uri: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_codes_match_wire_order() {
        let expected = [
            (PipelineRunStatus::Running, 0),
            (PipelineRunStatus::Pending, 1),
            (PipelineRunStatus::Failed, 2),
            (PipelineRunStatus::Partial, 3),
            (PipelineRunStatus::Synced, 4),
            (PipelineRunStatus::Skipped, 5),
            (PipelineRunStatus::TierBlocked, 6),
        ];
        for (status, code) in expected {
            assert_eq!(status.code(), code);
            assert_eq!(PipelineRunStatus::from_code(code), Some(status));
        }
    }

    #[test]
    fn statuses_serialize_as_integers() {
        let json = serde_json::to_string(&PipelineRunStatus::Synced).unwrap();
        assert_eq!(json, "4");
        let back: PipelineRunStatus = serde_json::from_str("6").unwrap();
        assert_eq!(back, PipelineRunStatus::TierBlocked);

        assert_eq!(serde_json::to_string(&DestinationStatus::Failed).unwrap(), "2");
    }

    #[test]
    fn terminal_statuses() {
        assert!(!PipelineRunStatus::Running.is_terminal());
        assert!(!PipelineRunStatus::Pending.is_terminal());
        assert!(PipelineRunStatus::Synced.is_terminal());
        assert!(PipelineRunStatus::Partial.is_terminal());
        assert!(PipelineRunStatus::TierBlocked.is_terminal());
        assert!(!DestinationStatus::Pending.is_terminal());
        assert!(DestinationStatus::Skipped.is_terminal());
    }
}

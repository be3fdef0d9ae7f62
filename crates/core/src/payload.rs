//! Inbound activity payload.

use serde::{Deserialize, Serialize};

use crate::activity::{Source, StandardizedActivity};

/// The message the upstream splitter targets at exactly one pipeline.
///
/// Tolerates camelCase and snake_case field names and ignores unknown
/// fields; older connectors still publish camelCase bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(default, alias = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub source: Source,
    /// Target pipeline. Required; an empty value is a config error.
    #[serde(default, alias = "pipelineId")]
    pub pipeline_id: String,
    /// Required on resume so the run re-attaches to the same activity.
    #[serde(default, alias = "activityId")]
    pub activity_id: String,
    #[serde(default, alias = "standardizedActivity")]
    pub standardized_activity: Option<StandardizedActivity>,
    #[serde(default, alias = "isResume")]
    pub is_resume: bool,
    /// When resuming, only providers named here run; empty = all.
    #[serde(default, alias = "resumeOnlyEnrichers")]
    pub resume_only_enrichers: Vec<String>,
    #[serde(default, alias = "useUpdateMethod")]
    pub use_update_method: bool,
    #[serde(default, alias = "resumePendingInputId")]
    pub resume_pending_input_id: String,
}

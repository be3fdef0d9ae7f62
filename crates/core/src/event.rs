//! The enriched event published to destination workers.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityType, Source, StandardizedActivity};
use crate::pipeline::Destination;

/// One fan-out unit: the fully enriched activity plus the exact set of
/// destinations this variant targets. Events emitted by the same
/// invocation share a `pipeline_execution_id` and have pairwise
/// disjoint destination sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(default, alias = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default, alias = "activityId")]
    pub activity_id: String,
    #[serde(default)]
    pub activity: StandardizedActivity,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub activity_type: ActivityType,
    /// Provider-type strings of every successful enricher, plus
    /// `branding` when the branding step ran.
    #[serde(default, alias = "appliedEnrichments")]
    pub applied_enrichments: Vec<String>,
    #[serde(default, alias = "enrichmentMetadata")]
    pub enrichment_metadata: IndexMap<String, String>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    #[serde(default, alias = "pipelineId")]
    pub pipeline_id: String,
    #[serde(default, alias = "pipelineExecutionId")]
    pub pipeline_execution_id: String,
    #[serde(default, alias = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "fitFileUri")]
    pub fit_file_uri: String,
    #[serde(default, alias = "useUpdateMethod")]
    pub use_update_method: bool,
}

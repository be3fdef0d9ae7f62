//! Provider result contract.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityType, TimeMarker};

/// What one enricher hands back to the orchestrator.
///
/// Everything is optional; the orchestrator merges whatever is present
/// into the in-flight activity. Stream slices are dense per-second
/// arrays indexed by offset from session start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Replaces the activity name when non-empty.
    #[serde(default)]
    pub name: String,
    /// Appended to the (possibly replaced) name when non-empty.
    #[serde(default)]
    pub name_suffix: String,
    /// This enricher's description slot content.
    #[serde(default)]
    pub description: String,
    /// Overrides the activity type unless `Unspecified`.
    #[serde(default)]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub time_markers: Vec<TimeMarker>,
    #[serde(default)]
    pub heart_rate_stream: Vec<f64>,
    #[serde(default)]
    pub power_stream: Vec<f64>,
    #[serde(default)]
    pub position_lat_stream: Vec<f64>,
    #[serde(default)]
    pub position_long_stream: Vec<f64>,
    /// Merged into the enriched event's metadata.
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
    /// Exposed as `section_header_{provider_type}` event metadata.
    #[serde(default)]
    pub section_header: String,
    /// Stop the chain; the run finishes as SKIPPED.
    #[serde(default)]
    pub halt_pipeline: bool,
    #[serde(default)]
    pub halt_reason: String,
}

impl EnrichmentResult {
    /// Whether any stream slice carries samples.
    pub fn has_stream_data(&self) -> bool {
        !self.heart_rate_stream.is_empty()
            || !self.power_stream.is_empty()
            || !self.position_lat_stream.is_empty()
            || !self.position_long_stream.is_empty()
    }
}

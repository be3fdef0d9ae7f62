//! Per-user pipeline configuration: one source, an ordered chain of
//! enrichers, and one or more destinations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Enricher provider kind. The string form (bare SCREAMING_SNAKE name)
/// is what `excluded_enrichers` sets and `applied_enrichments` lists
/// carry on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProviderType {
    #[default]
    Unspecified,
    Weather,
    MuscleHeatmap,
    AiSummary,
    ParkrunResults,
    Branding,
    Mock,
}

impl ProviderType {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ProviderType::Unspecified => "UNSPECIFIED",
            ProviderType::Weather => "WEATHER",
            ProviderType::MuscleHeatmap => "MUSCLE_HEATMAP",
            ProviderType::AiSummary => "AI_SUMMARY",
            ProviderType::ParkrunResults => "PARKRUN_RESULTS",
            ProviderType::Branding => "BRANDING",
            ProviderType::Mock => "MOCK",
        }
    }

    pub fn from_str_name(s: &str) -> Option<ProviderType> {
        Some(match s.trim().to_ascii_uppercase().as_str() {
            "UNSPECIFIED" | "" => ProviderType::Unspecified,
            "WEATHER" => ProviderType::Weather,
            "MUSCLE_HEATMAP" => ProviderType::MuscleHeatmap,
            "AI_SUMMARY" => ProviderType::AiSummary,
            "PARKRUN_RESULTS" => ProviderType::ParkrunResults,
            "BRANDING" => ProviderType::Branding,
            "MOCK" => ProviderType::Mock,
            _ => return None,
        })
    }
}

impl From<ProviderType> for String {
    fn from(t: ProviderType) -> String {
        t.as_str_name().to_string()
    }
}

impl TryFrom<String> for ProviderType {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ProviderType::from_str_name(&s).ok_or_else(|| CoreError::UnknownEnum {
            kind: "ProviderType",
            value: s,
        })
    }
}

/// Upload destination. Carries a wire-stable integer code because the
/// UI reads outcome document IDs directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Destination {
    Strava,
    Hevy,
    GoogleSheets,
    Showcase,
    Mock,
}

impl Destination {
    /// Wire-stable integer code. Outcome documents use this, rendered
    /// as a string, for their document ID.
    pub fn code(&self) -> i32 {
        match self {
            Destination::Strava => 1,
            Destination::Hevy => 2,
            Destination::GoogleSheets => 3,
            Destination::Showcase => 4,
            Destination::Mock => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Destination> {
        Some(match code {
            1 => Destination::Strava,
            2 => Destination::Hevy,
            3 => Destination::GoogleSheets,
            4 => Destination::Showcase,
            5 => Destination::Mock,
            _ => return None,
        })
    }

    /// Outcome subcollection document ID.
    pub fn doc_id(&self) -> String {
        self.code().to_string()
    }

    pub fn as_str_name(&self) -> &'static str {
        match self {
            Destination::Strava => "DESTINATION_STRAVA",
            Destination::Hevy => "DESTINATION_HEVY",
            Destination::GoogleSheets => "DESTINATION_GOOGLE_SHEETS",
            Destination::Showcase => "DESTINATION_SHOWCASE",
            Destination::Mock => "DESTINATION_MOCK",
        }
    }

    /// Bare lowercase name with the `DESTINATION_` prefix stripped
    /// (e.g. `hevy`). Keys `destination_configs` and metadata prefixes.
    pub fn short_name(&self) -> String {
        self.as_str_name()
            .trim_start_matches("DESTINATION_")
            .to_ascii_lowercase()
    }

    pub fn from_str_name(s: &str) -> Option<Destination> {
        let normalized = s.trim().to_ascii_uppercase();
        let bare = normalized.trim_start_matches("DESTINATION_");
        Some(match bare {
            "STRAVA" => Destination::Strava,
            "HEVY" => Destination::Hevy,
            "GOOGLE_SHEETS" => Destination::GoogleSheets,
            "SHOWCASE" => Destination::Showcase,
            "MOCK" => Destination::Mock,
            _ => return None,
        })
    }
}

impl From<Destination> for String {
    fn from(d: Destination) -> String {
        d.as_str_name().to_string()
    }
}

impl TryFrom<String> for Destination {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Destination::from_str_name(&s).ok_or_else(|| CoreError::UnknownEnum {
            kind: "Destination",
            value: s,
        })
    }
}

/// One configured enricher step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnricherEntry {
    pub provider: ProviderType,
    /// Opaque provider config, edited by the UI as string pairs.
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Per-destination settings inside a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationSettings {
    #[serde(default)]
    pub config: HashMap<String, String>,
    /// Provider-type strings whose output this destination drops.
    #[serde(default, alias = "excludedEnrichers")]
    pub excluded_enrichers: Vec<String>,
}

/// A user-owned pipeline: source, enricher chain, destinations.
///
/// Pipeline IDs are unique per user. A disabled pipeline is treated as
/// not-found by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub enrichers: Vec<EnricherEntry>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    #[serde(default, alias = "sourceConfig")]
    pub source_config: HashMap<String, String>,
    /// Keyed by the destination's short name (e.g. `hevy`).
    #[serde(default, alias = "destinationConfigs")]
    pub destination_configs: HashMap<String, DestinationSettings>,
    #[serde(default)]
    pub disabled: bool,
}

impl PipelineConfig {
    pub fn settings_for(&self, dest: &Destination) -> Option<&DestinationSettings> {
        self.destination_configs.get(&dest.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_codes_are_stable() {
        assert_eq!(Destination::Strava.code(), 1);
        assert_eq!(Destination::Hevy.code(), 2);
        assert_eq!(Destination::GoogleSheets.code(), 3);
        assert_eq!(Destination::Showcase.code(), 4);
        assert_eq!(Destination::Hevy.doc_id(), "2");
        for code in 1..=5 {
            assert_eq!(Destination::from_code(code).unwrap().code(), code);
        }
    }

    #[test]
    fn provider_type_string_round_trip() {
        for t in [
            ProviderType::Weather,
            ProviderType::MuscleHeatmap,
            ProviderType::AiSummary,
            ProviderType::Branding,
            ProviderType::Mock,
        ] {
            assert_eq!(ProviderType::from_str_name(t.as_str_name()), Some(t));
        }
    }

    #[test]
    fn pipeline_decodes_destination_settings() {
        let json = r#"{
            "id": "p1",
            "source": "strava",
            "enrichers": [{"provider": "MUSCLE_HEATMAP", "config": {"style": "dark"}}],
            "destinations": ["DESTINATION_STRAVA", "DESTINATION_HEVY"],
            "destinationConfigs": {
                "hevy": {"excludedEnrichers": ["MUSCLE_HEATMAP"]}
            }
        }"#;
        let p: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(p.enrichers[0].provider, ProviderType::MuscleHeatmap);
        assert_eq!(
            p.settings_for(&Destination::Hevy).unwrap().excluded_enrichers,
            vec!["MUSCLE_HEATMAP"]
        );
        assert!(p.settings_for(&Destination::Strava).is_none());
    }
}

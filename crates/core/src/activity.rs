//! Standardized activity model.
//!
//! Every connector normalizes its native format into
//! [`StandardizedActivity`] before anything downstream sees it. Field
//! names on the wire may arrive in camelCase (older connectors) or
//! snake_case; serde aliases accept both, and unknown fields are
//! ignored for forward compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Source platform an activity originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Source {
    #[default]
    Unspecified,
    GarminConnect,
    Strava,
    Hevy,
    Fitbit,
    Parkrun,
    FileUpload,
    Mock,
}

impl Source {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Source::Unspecified => "SOURCE_UNSPECIFIED",
            Source::GarminConnect => "SOURCE_GARMIN_CONNECT",
            Source::Strava => "SOURCE_STRAVA",
            Source::Hevy => "SOURCE_HEVY",
            Source::Fitbit => "SOURCE_FITBIT",
            Source::Parkrun => "SOURCE_PARKRUN",
            Source::FileUpload => "SOURCE_FILE_UPLOAD",
            Source::Mock => "SOURCE_MOCK",
        }
    }

    /// Bare lowercase name with the `SOURCE_` prefix stripped
    /// (e.g. `strava`). Used for config keys and same-source matching.
    pub fn short_name(&self) -> String {
        self.as_str_name()
            .trim_start_matches("SOURCE_")
            .to_ascii_lowercase()
    }

    pub fn from_str_name(s: &str) -> Option<Source> {
        let normalized = s.trim().to_ascii_uppercase();
        let bare = normalized.trim_start_matches("SOURCE_");
        Some(match bare {
            "UNSPECIFIED" | "" => Source::Unspecified,
            "GARMIN_CONNECT" | "GARMIN" => Source::GarminConnect,
            "STRAVA" => Source::Strava,
            "HEVY" => Source::Hevy,
            "FITBIT" => Source::Fitbit,
            "PARKRUN" => Source::Parkrun,
            "FILE_UPLOAD" => Source::FileUpload,
            "MOCK" => Source::Mock,
            _ => return None,
        })
    }
}

impl From<Source> for String {
    fn from(s: Source) -> String {
        s.as_str_name().to_string()
    }
}

impl TryFrom<String> for Source {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Source::from_str_name(&s).ok_or_else(|| CoreError::UnknownEnum {
            kind: "Source",
            value: s,
        })
    }
}

/// Activity discipline. `Unspecified` means the source did not say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ActivityType {
    #[default]
    Unspecified,
    Run,
    Ride,
    Swim,
    StrengthTraining,
    Walk,
    Hike,
    Other,
}

impl ActivityType {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ActivityType::Unspecified => "ACTIVITY_TYPE_UNSPECIFIED",
            ActivityType::Run => "ACTIVITY_TYPE_RUN",
            ActivityType::Ride => "ACTIVITY_TYPE_RIDE",
            ActivityType::Swim => "ACTIVITY_TYPE_SWIM",
            ActivityType::StrengthTraining => "ACTIVITY_TYPE_STRENGTH_TRAINING",
            ActivityType::Walk => "ACTIVITY_TYPE_WALK",
            ActivityType::Hike => "ACTIVITY_TYPE_HIKE",
            ActivityType::Other => "ACTIVITY_TYPE_OTHER",
        }
    }

    pub fn from_str_name(s: &str) -> Option<ActivityType> {
        let normalized = s.trim().to_ascii_uppercase();
        let bare = normalized.trim_start_matches("ACTIVITY_TYPE_");
        Some(match bare {
            "UNSPECIFIED" | "" => ActivityType::Unspecified,
            "RUN" => ActivityType::Run,
            "RIDE" | "BIKE" => ActivityType::Ride,
            "SWIM" => ActivityType::Swim,
            "STRENGTH_TRAINING" | "STRENGTH" => ActivityType::StrengthTraining,
            "WALK" => ActivityType::Walk,
            "HIKE" => ActivityType::Hike,
            "OTHER" => ActivityType::Other,
            _ => return None,
        })
    }
}

impl From<ActivityType> for String {
    fn from(t: ActivityType) -> String {
        t.as_str_name().to_string()
    }
}

impl TryFrom<String> for ActivityType {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ActivityType::from_str_name(&s).ok_or_else(|| CoreError::UnknownEnum {
            kind: "ActivityType",
            value: s,
        })
    }
}

/// A labelled instant inside an activity (e.g. an `exercise_start`
/// marker emitted by a strength-training source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeMarker {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub label: String,
    #[serde(default, alias = "markerType")]
    pub marker_type: String,
}

/// One sampled point in a lap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "heartRate")]
    pub heart_rate: Option<f64>,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default, alias = "positionLat")]
    pub position_lat: Option<f64>,
    #[serde(default, alias = "positionLong")]
    pub position_long: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
}

/// A lap groups consecutive records; strength sources use one lap per
/// exercise block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default, alias = "totalElapsedTime")]
    pub total_elapsed_time: f64,
    #[serde(default, alias = "totalDistance")]
    pub total_distance: f64,
    #[serde(default, alias = "exerciseName")]
    pub exercise_name: Option<String>,
}

/// One recorded strength set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrengthSet {
    #[serde(default, alias = "exerciseName")]
    pub exercise_name: String,
    #[serde(default)]
    pub reps: u32,
    #[serde(default, alias = "weightKg")]
    pub weight_kg: f64,
    #[serde(default, alias = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
}

/// Session summary. A standardized activity carries exactly one
/// session; the orchestrator rejects anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, alias = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
    /// Elapsed seconds. Must be > 0 for the activity to be valid.
    #[serde(default, alias = "totalElapsedTime")]
    pub total_elapsed_time: f64,
    #[serde(default, alias = "totalDistance")]
    pub total_distance: f64,
    #[serde(default, alias = "totalCalories")]
    pub total_calories: f64,
    #[serde(default, alias = "avgHeartRate")]
    pub avg_heart_rate: Option<f64>,
    #[serde(default)]
    pub laps: Vec<Lap>,
    #[serde(default, alias = "strengthSets")]
    pub strength_sets: Option<Vec<StrengthSet>>,
}

impl Session {
    /// Total record count across all laps.
    pub fn record_count(&self) -> usize {
        self.laps.iter().map(|l| l.records.len()).sum()
    }
}

/// The normalized activity all enrichers mutate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardizedActivity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        rename = "type",
        alias = "activity_type",
        alias = "activityType"
    )]
    pub activity_type: ActivityType,
    #[serde(default, alias = "externalId")]
    pub external_id: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "timeMarkers")]
    pub time_markers: Vec<TimeMarker>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl StandardizedActivity {
    /// The single session, when the activity is well-formed.
    pub fn session(&self) -> Option<&Session> {
        match self.sessions.as_slice() {
            [s] => Some(s),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        match self.sessions.as_mut_slice() {
            [s] => Some(s),
            _ => None,
        }
    }
}

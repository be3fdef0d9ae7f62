//! Fit artifact synthesis.
//!
//! Destination workers that need a file upload (and the showcase
//! renderer) read this compact binary artifact instead of re-deriving
//! it from the event. Layout: 8-byte header (magic + version +
//! summary length), a JSON summary block, then fixed-width
//! little-endian record rows.

use serde::{Deserialize, Serialize};

use fitglue_core::{CoreError, StandardizedActivity};

const MAGIC: &[u8; 4] = b"FITG";
const VERSION: u16 = 1;
/// offset u32 + hr u16 + power u16 + lat f64 + long f64 + altitude f32
const RECORD_ROW_LEN: usize = 28;

#[derive(Debug, Serialize, Deserialize)]
struct Summary {
    name: String,
    #[serde(rename = "type")]
    activity_type: String,
    start_time: Option<chrono::DateTime<chrono::Utc>>,
    total_elapsed_time: f64,
    total_distance: f64,
    total_calories: f64,
    record_count: u32,
}

/// Serialize the final activity into the artifact format.
pub fn encode(activity: &StandardizedActivity, title: &str) -> Result<Vec<u8>, CoreError> {
    let session = activity
        .session()
        .ok_or_else(|| CoreError::Serialize("activity has no single session".into()))?;

    let start = session.start_time;
    let records: Vec<&fitglue_core::Record> =
        session.laps.iter().flat_map(|l| l.records.iter()).collect();

    let summary = Summary {
        name: title.to_string(),
        activity_type: activity.activity_type.as_str_name().to_string(),
        start_time: start,
        total_elapsed_time: session.total_elapsed_time,
        total_distance: session.total_distance,
        total_calories: session.total_calories,
        record_count: records.len() as u32,
    };
    let summary_json = serde_json::to_vec(&summary)?;

    let mut out = Vec::with_capacity(8 + summary_json.len() + records.len() * RECORD_ROW_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    let summary_len = u16::try_from(summary_json.len())
        .map_err(|_| CoreError::Serialize("summary block too large".into()))?;
    out.extend_from_slice(&summary_len.to_le_bytes());
    out.extend_from_slice(&summary_json);

    for record in records {
        let offset = match (record.timestamp, start) {
            (Some(ts), Some(start)) => (ts - start).num_seconds().max(0) as u32,
            _ => 0,
        };
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&(record.heart_rate.unwrap_or(0.0) as u16).to_le_bytes());
        out.extend_from_slice(&(record.power.unwrap_or(0.0) as u16).to_le_bytes());
        out.extend_from_slice(&record.position_lat.unwrap_or(0.0).to_le_bytes());
        out.extend_from_slice(&record.position_long.unwrap_or(0.0).to_le_bytes());
        out.extend_from_slice(&(record.altitude.unwrap_or(0.0) as f32).to_le_bytes());
    }

    Ok(out)
}

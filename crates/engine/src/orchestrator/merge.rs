//! Merging one provider result into the in-flight activity.

use chrono::Duration;

use fitglue_core::{ActivityType, EnrichmentResult, Lap, Record, Session, StandardizedActivity};

use crate::slots::DescriptionSlots;

/// Apply a successful enrichment to the working activity and slots.
/// `index` is the provider's position in the pipeline config.
pub fn apply_result(
    activity: &mut StandardizedActivity,
    slots: &mut DescriptionSlots,
    index: usize,
    result: &EnrichmentResult,
) {
    if !result.name.is_empty() {
        activity.name = result.name.clone();
    }
    if !result.name_suffix.is_empty() {
        activity.name.push_str(&result.name_suffix);
    }
    if result.activity_type != ActivityType::Unspecified {
        activity.activity_type = result.activity_type;
    }
    activity.tags.extend(result.tags.iter().cloned());
    activity
        .time_markers
        .extend(result.time_markers.iter().cloned());

    slots.set_enricher(index, &result.description);

    if let Some(session) = activity.session_mut() {
        merge_streams(session, result);
    }
}

/// Overlay dense per-second stream slices onto lap records.
///
/// When the session has fewer records than `elapsed / 4` (minimum
/// threshold 1), the first lap is expanded with one-second placeholder
/// records from session start until it holds `elapsed` entries. Each
/// record with a timestamp then picks up the stream samples at its
/// offset from session start. Applying the same result twice yields
/// the same records.
pub fn merge_streams(session: &mut Session, result: &EnrichmentResult) {
    if !result.has_stream_data() {
        return;
    }

    let elapsed = session.total_elapsed_time.floor() as usize;
    let threshold = (elapsed / 4).max(1);
    if session.record_count() < threshold {
        expand_with_placeholders(session, elapsed);
    }

    let Some(start) = session.start_time else {
        return;
    };

    for lap in &mut session.laps {
        for record in &mut lap.records {
            let Some(ts) = record.timestamp else {
                continue;
            };
            let offset = (ts - start).num_seconds();
            if offset < 0 {
                continue;
            }
            let offset = offset as usize;

            if let Some(&hr) = result.heart_rate_stream.get(offset) {
                if hr > 0.0 {
                    record.heart_rate = Some(hr);
                }
            }
            if let Some(&power) = result.power_stream.get(offset) {
                if power > 0.0 {
                    record.power = Some(power);
                }
            }
            if let Some(&lat) = result.position_lat_stream.get(offset) {
                record.position_lat = Some(lat);
            }
            if let Some(&long) = result.position_long_stream.get(offset) {
                record.position_long = Some(long);
            }
        }
    }
}

fn expand_with_placeholders(session: &mut Session, elapsed: usize) {
    let Some(start) = session.start_time else {
        return;
    };
    if session.laps.is_empty() {
        session.laps.push(Lap::default());
    }
    let lap = &mut session.laps[0];
    while lap.records.len() < elapsed {
        let offset = lap.records.len() as i64;
        lap.records.push(Record {
            timestamp: Some(start + Duration::seconds(offset)),
            ..Record::default()
        });
    }
}

//! Time-marker reconciliation.
//!
//! Strength sources emit generic `exercise_start` markers; recorded
//! strength sets usually carry better exercise names. This pass
//! re-labels markers from sets, preferring a timestamp match and
//! falling back to positional pairing when the source stamped every
//! set with the workout start.

use chrono::Duration;

use fitglue_core::StandardizedActivity;

const EXERCISE_START: &str = "exercise_start";
const MATCH_WINDOW_MINUTES: i64 = 5;

/// Re-label `exercise_start` markers from strength-set names.
///
/// No-op when markers or sets are absent; idempotent on repeated runs.
pub fn reconcile_exercise_markers(activity: &mut StandardizedActivity) {
    let sets: Vec<(Option<chrono::DateTime<chrono::Utc>>, String)> = match activity
        .session()
        .and_then(|s| s.strength_sets.as_ref())
    {
        Some(sets) if !sets.is_empty() => sets
            .iter()
            .map(|s| (s.start_time, s.exercise_name.clone()))
            .collect(),
        _ => return,
    };

    let has_markers = activity
        .time_markers
        .iter()
        .any(|m| m.marker_type == EXERCISE_START);
    if !has_markers {
        return;
    }

    // Position fallback applies when every set shares one start time
    // (the source emitted workout-start for all sets).
    let all_same_start = sets.windows(2).all(|w| w[0].0 == w[1].0);

    if all_same_start {
        // Distinct exercise names in encounter order; the k-th name
        // labels the k-th marker. Markers beyond the last distinct
        // name keep their label.
        let mut distinct: Vec<&str> = Vec::new();
        for (_, name) in &sets {
            if !name.is_empty() && !distinct.contains(&name.as_str()) {
                distinct.push(name);
            }
        }
        let mut k = 0;
        for marker in activity
            .time_markers
            .iter_mut()
            .filter(|m| m.marker_type == EXERCISE_START)
        {
            if let Some(name) = distinct.get(k) {
                marker.label = name.to_string();
            }
            k += 1;
        }
        return;
    }

    let window = Duration::minutes(MATCH_WINDOW_MINUTES);
    for marker in activity
        .time_markers
        .iter_mut()
        .filter(|m| m.marker_type == EXERCISE_START)
    {
        let matched = sets.iter().find(|(start, name)| {
            if name.is_empty() {
                return false;
            }
            match start {
                Some(start) => {
                    let delta = (*start - marker.timestamp).abs();
                    delta <= window
                }
                None => false,
            }
        });
        if let Some((_, name)) = matched {
            marker.label = name.clone();
        }
    }
}

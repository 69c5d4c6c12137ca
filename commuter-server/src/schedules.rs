//! Schedule window extraction.
//!
//! Given the schedule entries for a trip, find the entry at a given stop
//! whose departure time is closest to a target instant, then extract the
//! surrounding window: the contiguous run of earlier stops before it and
//! later stops after it, by stop_sequence. Upstream schedule lists are not
//! guaranteed to be ordered, so the window walk stops at the first
//! non-monotone neighbor in each direction.

use chrono::{DateTime, Utc};

use crate::mbta::Schedule;

/// Parse an MBTA timestamp (RFC 3339 with offset).
fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Index of the schedule entry at `stop_id` whose departure time is closest
/// to `target`. Entries without a departure time are skipped.
pub fn closest_departure_index(
    schedules: &[Schedule],
    stop_id: &str,
    target: DateTime<Utc>,
) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;

    for (i, schedule) in schedules.iter().enumerate() {
        if schedule.stop_id() != Some(stop_id) {
            continue;
        }
        let Some(departure) = schedule.attributes.departure_time.as_deref().and_then(parse_time)
        else {
            continue;
        };

        let diff = (departure - target).num_milliseconds().abs();
        if best.is_none_or(|(_, best_diff)| diff < best_diff) {
            best = Some((i, diff));
        }
    }

    best.map(|(i, _)| i)
}

/// Extract the window of stops around the entry closest to `target` at
/// `stop_id`: previous stops, the current stop, then next stops, in travel
/// order. Empty when the stop has no scheduled departure.
pub fn schedule_window<'a>(
    schedules: &'a [Schedule],
    stop_id: &str,
    target: DateTime<Utc>,
) -> Vec<&'a Schedule> {
    let Some(current_idx) = closest_departure_index(schedules, stop_id, target) else {
        return Vec::new();
    };

    let current = &schedules[current_idx];
    let mut window = Vec::new();

    // Walk backwards collecting strictly earlier stops.
    let mut sequence = current.attributes.stop_sequence;
    let mut previous = Vec::new();
    for schedule in schedules[..current_idx].iter().rev() {
        if schedule.attributes.stop_sequence < sequence {
            previous.push(schedule);
            sequence = schedule.attributes.stop_sequence;
        } else {
            break;
        }
    }
    previous.reverse();
    window.extend(previous);

    window.push(current);

    // Walk forwards collecting strictly later stops.
    let mut sequence = current.attributes.stop_sequence;
    for schedule in &schedules[current_idx + 1..] {
        if schedule.attributes.stop_sequence > sequence {
            window.push(schedule);
            sequence = schedule.attributes.stop_sequence;
        } else {
            break;
        }
    }

    window
}

use std::collections::BTreeMap;

use super::{count_by, entries_in_window, DayWindow};
use crate::models::{BathroomEvent, BathroomKind, Entry, TherapySession};

pub fn bathroom_counts(
    entries: &[Entry<BathroomEvent>],
    window: DayWindow,
) -> BTreeMap<BathroomKind, usize> {
    count_by(entries, window, |event| event.kind)
}

pub fn therapy_minutes(entries: &[Entry<TherapySession>], window: DayWindow) -> u32 {
    entries_in_window(entries, window)
        .map(|entry| entry.payload.duration_minutes)
        .sum()
}

/// Mean mood change across sessions that recorded both ends.
pub fn average_mood_delta(entries: &[Entry<TherapySession>], window: DayWindow) -> Option<f64> {
    let deltas: Vec<i32> = entries_in_window(entries, window)
        .filter_map(|entry| entry.payload.mood_delta())
        .collect();

    if deltas.is_empty() {
        return None;
    }
    Some(deltas.iter().sum::<i32>() as f64 / deltas.len() as f64)
}

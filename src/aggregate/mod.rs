//! Rollups over a collection snapshot.
//!
//! Everything here is a pure function of the entries passed in. Nothing is
//! cached; collections are user-sized, so callers recompute on every change.

mod activity;
mod nutrition;
mod units;

use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone};
use std::collections::BTreeMap;

use crate::models::Entry;

pub use activity::{average_mood_delta, bathroom_counts, therapy_minutes};
pub use nutrition::{by_meal, calories_in_window, daily_nutrition, NutritionTotals};
pub use units::{convert, from_oz, goal_progress, oz_per_unit, to_oz, water_total, ML_PER_OZ};

/// Length of a day window in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Half-open window `[start_ms, start_ms + 24h)` over entry timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DayWindow {
    pub fn starting_at(start_ms: i64) -> Self {
        Self {
            start_ms,
            end_ms: start_ms.saturating_add(DAY_MS),
        }
    }

    /// Window beginning at local midnight of `date` in `tz`.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let midnight = date.and_time(NaiveTime::MIN);
        // Zones that skip midnight for DST start the day an hour later
        let start_ms = tz
            .from_local_datetime(&midnight)
            .earliest()
            .or_else(|| {
                tz.from_local_datetime(&(midnight + Duration::hours(1)))
                    .earliest()
            })
            .map(|start| start.timestamp_millis())
            .unwrap_or_else(|| midnight.and_utc().timestamp_millis());

        Self::starting_at(start_ms)
    }

    /// Today's window in the system time zone.
    pub fn today() -> Self {
        Self::for_date(Local::now().date_naive(), &Local)
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms < self.end_ms
    }
}

/// Entries whose timestamp falls inside the window, in collection order.
pub fn entries_in_window<P>(
    entries: &[Entry<P>],
    window: DayWindow,
) -> impl Iterator<Item = &Entry<P>> {
    entries
        .iter()
        .filter(move |entry| window.contains(entry.timestamp))
}

/// Sums a per-payload value over the window.
pub fn sum_in_window<P>(
    entries: &[Entry<P>],
    window: DayWindow,
    value: impl Fn(&P) -> f64,
) -> f64 {
    entries_in_window(entries, window)
        .map(|entry| value(&entry.payload))
        .sum()
}

/// Counts entries per key over the window.
pub fn count_by<P, K: Ord>(
    entries: &[Entry<P>],
    window: DayWindow,
    key: impl Fn(&P) -> K,
) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries_in_window(entries, window) {
        *counts.entry(key(&entry.payload)).or_insert(0) += 1;
    }
    counts
}

/// One summed value per local day, `from` through `to` inclusive.
///
/// Days without entries are present with a zero value.
pub fn daily_series<P, Tz: TimeZone>(
    entries: &[Entry<P>],
    from: NaiveDate,
    to: NaiveDate,
    tz: &Tz,
    value: impl Fn(&P) -> f64,
) -> Vec<(NaiveDate, f64)> {
    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| {
            let window = DayWindow::for_date(day, tz);
            (day, sum_in_window(entries, window, &value))
        })
        .collect()
}

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of a healthy night.
pub const HEALTHY_MIN_HOURS: f64 = 7.0;
/// Upper bound (inclusive) of a healthy night.
pub const HEALTHY_MAX_HOURS: f64 = 9.0;

/// Number of buckets in the hour distribution (0h through 9h+).
pub const DISTRIBUTION_BUCKETS: usize = 10;

// ==================== Types ====================

/// One logged night, as stored in the `sleep_logs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub user_id: String,
    pub sleep_date: NaiveDate,
    pub hours_slept: f64,
}

impl SleepRecord {
    pub fn new(user_id: impl Into<String>, sleep_date: NaiveDate, hours_slept: f64) -> Self {
        Self {
            user_id: user_id.into(),
            sleep_date,
            hours_slept,
        }
    }
}

/// Derived summary shown as "Week in Review".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StatsSummary {
    /// Arithmetic mean of hours slept
    pub average_hours: f64,
    /// Share of nights in [7, 9] hours, 0-100
    pub healthy_percentage: f64,
    /// Consecutive days ending at the most recent logged date
    pub streak_days: u32,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1} hrs avg | {:.1}% healthy | {} streak",
            self.average_hours, self.healthy_percentage, self.streak_days
        )
    }
}

// ==================== Aggregation ====================

/// Whether a night falls in the healthy range. Both bounds are inclusive.
pub fn is_healthy(hours: f64) -> bool {
    (HEALTHY_MIN_HOURS..=HEALTHY_MAX_HOURS).contains(&hours)
}

/// Compute average hours, healthy-night percentage and current streak.
///
/// The input does not need to be sorted. Records sharing a date are each
/// counted for the average and the healthy share; the streak looks at
/// distinct dates only. An empty slice yields an all-zero summary.
pub fn compute_stats(records: &[SleepRecord]) -> StatsSummary {
    if records.is_empty() {
        return StatsSummary::default();
    }

    let n = records.len() as f64;
    let total: f64 = records.iter().map(|r| r.hours_slept).sum();
    let healthy = records.iter().filter(|r| is_healthy(r.hours_slept)).count();

    StatsSummary {
        average_hours: total / n,
        healthy_percentage: healthy as f64 / n * 100.0,
        streak_days: streak_days(records),
    }
}

/// Count consecutive days backward from the latest logged date.
///
/// Stops at the first gap, so an older run of consecutive days behind a gap
/// is never counted.
pub fn streak_days(records: &[SleepRecord]) -> u32 {
    let mut dates: Vec<NaiveDate> = records.iter().map(|r| r.sleep_date).collect();
    if dates.is_empty() {
        return 0;
    }
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();

    let mut count = 1;
    for pair in dates.windows(2) {
        if (pair[0] - pair[1]).num_days() == 1 {
            count += 1;
        } else {
            break;
        }
    }
    count
}

/// Count nights per whole hour, 0h to 9h. Ten hours or more land in the
/// last bucket and negative values in the first.
pub fn hour_distribution(records: &[SleepRecord]) -> [usize; DISTRIBUTION_BUCKETS] {
    let mut buckets = [0usize; DISTRIBUTION_BUCKETS];
    for record in records {
        let hour = record
            .hours_slept
            .floor()
            .clamp(0.0, (DISTRIBUTION_BUCKETS - 1) as f64) as usize;
        buckets[hour] += 1;
    }
    buckets
}

/// The `limit` most recent records, ordered oldest to newest for charting.
pub fn recent_trend(records: &[SleepRecord], limit: usize) -> Vec<SleepRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.sleep_date.cmp(&a.sleep_date));
    sorted.truncate(limit);
    sorted.reverse();
    sorted
}

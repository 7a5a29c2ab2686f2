use chrono::NaiveTime;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Hours between going to bed and waking up.
///
/// A wake time at or before the bed time is read as the next morning,
/// except that identical times mean no sleep at all.
pub fn hours_between(bed: NaiveTime, wake: NaiveTime) -> f64 {
    let mut seconds = (wake - bed).num_seconds();
    if seconds < 0 {
        seconds += SECONDS_PER_DAY;
    }
    seconds as f64 / 3600.0
}

/// Split fractional hours into whole hours and rounded minutes.
pub fn split_hours(hours: f64) -> (u32, u32) {
    let hours = hours.max(0.0);
    let mut whole = hours.floor() as u32;
    let mut minutes = ((hours - hours.floor()) * 60.0).round() as u32;
    if minutes == 60 {
        whole += 1;
        minutes = 0;
    }
    (whole, minutes)
}

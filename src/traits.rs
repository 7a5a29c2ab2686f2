//! Abstraction over time access so "today" can be pinned in tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Trait for abstracting time access.
///
/// Sleep logs are keyed by local calendar date, so `today` follows the
/// local timezone rather than UTC.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current time in the local timezone.
    fn now_local(&self) -> DateTime<Local>;

    /// Today's local calendar date.
    fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
    today: Arc<Mutex<Option<NaiveDate>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
            today: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a mock clock whose `today` is fixed regardless of timezone.
    pub fn on_date(date: NaiveDate) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc();
        let clock = Self::new(noon);
        *clock.today.lock().unwrap() = Some(date);
        clock
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap() = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.utc_time.lock().unwrap();
        *time += duration;
        if let Some(day) = self.today.lock().unwrap().as_mut() {
            *day = time.date_naive();
        }
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap()
    }

    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }

    fn today(&self) -> NaiveDate {
        match *self.today.lock().unwrap() {
            Some(date) => date,
            None => self.now_local().date_naive(),
        }
    }
}

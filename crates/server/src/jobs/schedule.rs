//! Calendar trigger rules.
//!
//! A [`Schedule`] names wall-clock firing instants: a minute, one or more
//! hours, and optionally a weekday. This covers the triggers the service
//! needs (daily at midnight, Fridays at 14:00, daily at 10:00 and 18:00)
//! without a cron-expression parser.

use chrono::{DateTime, Datelike, Days, Utc, Weekday};

/// A wall-clock trigger: fires at `minute` past each listed hour, every day
/// or on one weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    minute: u32,
    hours: Vec<u32>,
    weekday: Option<Weekday>,
}

impl Schedule {
    /// Every day at `hour:minute`.
    #[must_use]
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self::at_hours(&[hour], minute)
    }

    /// Every `weekday` at `hour:minute`.
    #[must_use]
    pub fn weekly(weekday: Weekday, hour: u32, minute: u32) -> Self {
        let mut schedule = Self::at_hours(&[hour], minute);
        schedule.weekday = Some(weekday);
        schedule
    }

    /// Every day at `minute` past each of `hours`.
    ///
    /// # Panics
    ///
    /// Panics if `hours` is empty or any component is out of range; triggers
    /// are wired from constants and validated defaults at startup.
    #[must_use]
    pub fn at_hours(hours: &[u32], minute: u32) -> Self {
        assert!(!hours.is_empty(), "schedule needs at least one hour");
        assert!(minute < 60, "minute out of range");
        assert!(hours.iter().all(|&h| h < 24), "hour out of range");

        let mut hours = hours.to_vec();
        hours.sort_unstable();
        hours.dedup();

        Self {
            minute,
            hours,
            weekday: None,
        }
    }

    /// The next firing instant strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let start = after.date_naive();

        // Scanning eight days covers today plus one full week, so any
        // weekday rule matches at least once with a candidate after `after`.
        for day in 0..=7 {
            let date = start + Days::new(day);
            if let Some(required) = self.weekday
                && date.weekday() != required
            {
                continue;
            }

            for &hour in &self.hours {
                if let Some(candidate) = date.and_hms_opt(hour, self.minute, 0) {
                    let candidate = candidate.and_utc();
                    if candidate > after {
                        return candidate;
                    }
                }
            }
        }

        unreachable!("a validated schedule fires within one week");
    }
}

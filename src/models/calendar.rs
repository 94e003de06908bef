//! Shift windows on the tenant's wall clock.
//!
//! # Time Model
//! All instants are `NaiveDateTime` in the tenant's local time. A shift
//! that crosses midnight starts on its slot date and ends on the next day.
//!
//! # Intervals
//! Windows are half-open `[start, end)`: a shift ending at 06:00 does not
//! overlap one starting at 06:00.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A concrete time interval [start, end).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShiftWindow {
    /// Interval start (inclusive).
    pub start: NaiveDateTime,
    /// Interval end (exclusive).
    pub end: NaiveDateTime,
}

impl ShiftWindow {
    /// Creates a new window.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Builds the window for a start/end wall-clock pair on `date`.
    ///
    /// If `end <= start` the window rolls over into the next day.
    pub fn on_date(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        let start_at = date.and_time(start);
        let end_date = if end <= start {
            date + Duration::days(1)
        } else {
            date
        };
        Self::new(start_at, end_date.and_time(end))
    }

    /// Length of the window.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Length of the window in fractional hours.
    #[inline]
    pub fn hours(&self) -> f64 {
        self.duration().num_minutes() as f64 / 60.0
    }

    /// Whether an instant falls within this window.
    #[inline]
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at < self.end
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside this window.
    pub fn covers(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Hours of rest between `end` and the start of this window.
    ///
    /// Negative when `end` falls after the start.
    pub fn rest_hours_since(&self, end: NaiveDateTime) -> f64 {
        (self.start - end).num_minutes() as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn time(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_day_window() {
        let w = ShiftWindow::on_date(date(3), time(9), time(17));
        assert_eq!(w.start, date(3).and_time(time(9)));
        assert_eq!(w.end, date(3).and_time(time(17)));
        assert!((w.hours() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_night_window_crosses_midnight() {
        let w = ShiftWindow::on_date(date(3), time(22), time(6));
        assert_eq!(w.end, date(4).and_time(time(6)));
        assert!((w.hours() - 8.0).abs() < 1e-9);
        assert!(w.contains(date(4).and_time(time(1))));
    }

    #[test]
    fn test_touching_windows_do_not_overlap() {
        let night = ShiftWindow::on_date(date(3), time(22), time(6));
        let morning = ShiftWindow::on_date(date(4), time(6), time(14));
        assert!(!night.overlaps(&morning));
        assert!(morning.rest_hours_since(night.end).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_and_cover() {
        let a = ShiftWindow::on_date(date(3), time(8), time(16));
        let b = ShiftWindow::on_date(date(3), time(12), time(20));
        let inner = ShiftWindow::on_date(date(3), time(9), time(10));
        assert!(a.overlaps(&b));
        assert!(a.covers(&inner));
        assert!(!a.covers(&b));
        assert!(b.rest_hours_since(a.end) < 0.0);
    }
}

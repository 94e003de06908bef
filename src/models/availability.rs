//! Employee availability.
//!
//! Availability entries are created by employees or HR (including approved
//! leave, which arrives as `unavailable`). The scheduler consults them and
//! never mutates them.
//!
//! # Precedence
//! `forbidden`, `blackout` and `unavailable` block an assignment whenever
//! their window overlaps the shift. `preferred` and `available` never
//! block; `preferred` is a ranking signal and a soft-rule input.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::ShiftWindow;

/// Availability type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityKind {
    Available,
    Unavailable,
    Preferred,
    Blackout,
}

/// One availability statement for one employee on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeAvailability {
    /// Employee the entry belongs to.
    pub employee_id: String,
    /// Date the entry applies to.
    pub date: NaiveDate,
    /// Optional wall-clock window. `None` covers the whole day.
    #[serde(default)]
    pub window: Option<(NaiveTime, NaiveTime)>,
    /// Availability type.
    pub kind: AvailabilityKind,
    /// The employee must be scheduled on this date.
    #[serde(default)]
    pub pinned: bool,
    /// The employee must not be scheduled on this date.
    #[serde(default)]
    pub forbidden: bool,
}

impl EmployeeAvailability {
    /// Creates a whole-day entry.
    pub fn new(employee_id: impl Into<String>, date: NaiveDate, kind: AvailabilityKind) -> Self {
        Self {
            employee_id: employee_id.into(),
            date,
            window: None,
            kind,
            pinned: false,
            forbidden: false,
        }
    }

    /// Whole-day blackout.
    pub fn blackout(employee_id: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(employee_id, date, AvailabilityKind::Blackout)
    }

    /// Whole-day unavailability (e.g. approved leave).
    pub fn unavailable(employee_id: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(employee_id, date, AvailabilityKind::Unavailable)
    }

    /// Whole-day preference.
    pub fn preferred(employee_id: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(employee_id, date, AvailabilityKind::Preferred)
    }

    /// Restricts the entry to a wall-clock window.
    pub fn with_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.window = Some((start, end));
        self
    }

    /// Marks the entry as pinned.
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Marks the entry as forbidden.
    pub fn forbidden(mut self) -> Self {
        self.forbidden = true;
        self
    }

    /// Concrete window of this entry.
    pub fn span(&self) -> ShiftWindow {
        match self.window {
            Some((start, end)) => ShiftWindow::on_date(self.date, start, end),
            None => ShiftWindow::on_date(self.date, NaiveTime::MIN, NaiveTime::MIN),
        }
    }

    /// Whether this entry prevents working during `shift`.
    pub fn blocks(&self, shift: &ShiftWindow) -> bool {
        let blocking = self.forbidden
            || matches!(
                self.kind,
                AvailabilityKind::Unavailable | AvailabilityKind::Blackout
            );
        blocking && self.span().overlaps(shift)
    }

    /// Whether this entry expresses a preference that covers `shift`.
    pub fn prefers(&self, shift: &ShiftWindow) -> bool {
        self.kind == AvailabilityKind::Preferred && !self.forbidden && self.span().covers(shift)
    }
}

//! Conflict records.
//!
//! Conflicts are residual problems found after a commit. They are shown to
//! operators and never block persistence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Assignee;

/// Display severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Conflict,
}

/// Classification of detected conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Assignee holds two overlapping assignments.
    DoubleBooked,
    /// Rest between consecutive assignments is below the minimum.
    RestBreach,
    /// Fewer assignments than demanded for a (date, template).
    CoverageShortfall,
    /// An approved exception has lapsed.
    ExceptionExpired,
    /// An exception the schedule relies on is still pending or rejected.
    ExceptionUnapproved,
    /// A pinned employee has no assignment on the pinned date.
    PinnedNotScheduled,
}

impl ConflictKind {
    /// Machine-readable code, also used for slot flags.
    pub fn code(&self) -> &'static str {
        match self {
            ConflictKind::DoubleBooked => "double_booked",
            ConflictKind::RestBreach => "rest_breach",
            ConflictKind::CoverageShortfall => "coverage_shortfall",
            ConflictKind::ExceptionExpired => "exception_expired",
            ConflictKind::ExceptionUnapproved => "exception_unapproved",
            ConflictKind::PinnedNotScheduled => "pinned_not_scheduled",
        }
    }
}

/// Resolution state of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    #[default]
    Open,
    Acknowledged,
    Resolved,
}

/// A detected conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Conflict ID.
    pub id: String,
    /// Schedule the conflict was found in.
    pub schedule_id: String,
    /// Conflict type.
    pub kind: ConflictKind,
    /// Display severity.
    pub severity: Severity,
    /// Affected assignee, if any.
    #[serde(default)]
    pub assignee: Option<Assignee>,
    /// Affected assignments.
    #[serde(default)]
    pub assignment_ids: Vec<String>,
    /// Affected date.
    pub date: NaiveDate,
    /// Human-readable description.
    pub message: String,
    /// Resolution state.
    #[serde(default)]
    pub resolution: ResolutionState,
}

impl Conflict {
    /// Creates an open conflict.
    pub fn new(
        schedule_id: impl Into<String>,
        kind: ConflictKind,
        severity: Severity,
        date: NaiveDate,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            schedule_id: schedule_id.into(),
            kind,
            severity,
            assignee: None,
            assignment_ids: Vec::new(),
            date,
            message: message.into(),
            resolution: ResolutionState::Open,
        }
    }

    /// Sets the affected assignee.
    pub fn with_assignee(mut self, assignee: Assignee) -> Self {
        self.assignee = Some(assignee);
        self
    }

    /// Adds affected assignments.
    pub fn with_assignments(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.assignment_ids.extend(ids);
        self
    }

    /// Whether the conflict still needs attention.
    pub fn is_open(&self) -> bool {
        self.resolution == ResolutionState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Conflict > Severity::Warning);
    }

    #[test]
    fn test_conflict_builder() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let c = Conflict::new("s1", ConflictKind::RestBreach, Severity::Conflict, d, "only 8h rest")
            .with_assignee(Assignee::Employee("e1".into()))
            .with_assignments(vec!["a1".to_string(), "a2".to_string()]);
        assert!(c.is_open());
        assert_eq!(c.assignment_ids.len(), 2);
        assert_eq!(c.kind.code(), "rest_breach");
    }
}

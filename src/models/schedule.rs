//! Schedule (solution) model.
//!
//! A schedule is a week-scoped container of slot assignments produced by
//! one run. It moves through an approval lifecycle and is archived, never
//! deleted.
//!
//! # Lifecycle
//! ```text
//! draft ──► pending_approval ──► approved ──► active ──► archived
//!   │               │
//!   │               └──► rejected ──► draft | archived
//!   └──► archived
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Assignee, AssignmentMode, Severity, ShiftCategory, ShiftWindow};
use crate::error::SchedulerError;

/// Scheduling algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Greedy,
    Constraint,
    SimulatedAnnealing,
    Genetic,
    ScoreRank,
    Manual,
}

impl Algorithm {
    /// All algorithms, in registry order.
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Greedy,
        Algorithm::Constraint,
        Algorithm::SimulatedAnnealing,
        Algorithm::Genetic,
        Algorithm::ScoreRank,
        Algorithm::Manual,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Greedy => "greedy",
            Algorithm::Constraint => "constraint",
            Algorithm::SimulatedAnnealing => "simulated_annealing",
            Algorithm::Genetic => "genetic",
            Algorithm::ScoreRank => "score_rank",
            Algorithm::Manual => "manual",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "greedy" => Ok(Algorithm::Greedy),
            "constraint" | "ilp" | "cp" => Ok(Algorithm::Constraint),
            "simulated_annealing" | "annealing" | "sa" => Ok(Algorithm::SimulatedAnnealing),
            "genetic" | "ga" => Ok(Algorithm::Genetic),
            "score_rank" | "scorerank" => Ok(Algorithm::ScoreRank),
            "manual" => Ok(Algorithm::Manual),
            _ => Err(SchedulerError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Schedule approval status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Active,
    Archived,
}

impl ScheduleStatus {
    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: ScheduleStatus) -> bool {
        use ScheduleStatus::*;
        matches!(
            (self, next),
            (Draft, PendingApproval)
                | (Draft, Archived)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Rejected, Draft)
                | (Rejected, Archived)
                | (Approved, Active)
                | (Active, Archived)
        )
    }

    /// Whether the schedule has been published to staff.
    pub fn is_published(self) -> bool {
        matches!(self, ScheduleStatus::Approved | ScheduleStatus::Active)
    }
}

/// Who produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignedBy {
    Algorithm,
    Manual,
    System,
}

/// A warning or conflict marker attached to one assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotFlag {
    /// Severity shown in the UI.
    pub severity: Severity,
    /// Short machine-readable code (e.g. `rest_breach`).
    pub code: String,
}

/// One schedulable unit of work: a (date, template) position with
/// headcount one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Stable slot identifier: `{date}:{template}:{index}`.
    pub id: String,
    /// Slot date (the date the shift starts).
    pub date: NaiveDate,
    /// Shift template.
    pub template_id: String,
    /// Position within the headcount (0-based).
    pub index: u32,
    /// Shift category.
    pub category: ShiftCategory,
    /// Concrete shift window.
    pub window: ShiftWindow,
    /// Roles the assignee must hold.
    #[serde(default)]
    pub required_roles: Vec<String>,
    /// Team restriction.
    #[serde(default)]
    pub team_id: Option<String>,
    /// Branch restriction.
    #[serde(default)]
    pub branch_id: Option<String>,
    /// Template priority (iteration order).
    #[serde(default)]
    pub priority: i32,
}

impl Slot {
    /// Builds the canonical slot ID.
    pub fn make_id(date: NaiveDate, template_id: &str, index: u32) -> String {
        format!("{date}:{template_id}:{index}")
    }
}

/// A slot-assignee-time assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique assignment ID.
    pub id: String,
    /// Owning schedule (set when persisted).
    #[serde(default)]
    pub schedule_id: Option<String>,
    /// Slot this assignment fills.
    pub slot_id: String,
    /// Employee or team holding the slot.
    pub assignee: Assignee,
    /// Slot date.
    pub date: NaiveDate,
    /// Shift template.
    pub template_id: String,
    /// Shift category.
    pub category: ShiftCategory,
    /// Concrete shift window.
    pub window: ShiftWindow,
    /// Producer of the assignment.
    pub assigned_by: AssignedBy,
    /// Protects the assignment from regeneration.
    #[serde(default)]
    pub manual_lock: bool,
    /// Per-slot warnings/conflicts.
    #[serde(default)]
    pub flags: Vec<SlotFlag>,
}

impl Assignment {
    /// Creates an algorithmic assignment for a slot.
    pub fn for_slot(slot: &Slot, assignee: Assignee) -> Self {
        Self {
            id: slot.id.clone(),
            schedule_id: None,
            slot_id: slot.id.clone(),
            assignee,
            date: slot.date,
            template_id: slot.template_id.clone(),
            category: slot.category.clone(),
            window: slot.window,
            assigned_by: AssignedBy::Algorithm,
            manual_lock: false,
            flags: Vec::new(),
        }
    }

    /// Sets the producer.
    pub fn with_assigned_by(mut self, assigned_by: AssignedBy) -> Self {
        self.assigned_by = assigned_by;
        self
    }

    /// Locks the assignment against regeneration.
    pub fn locked(mut self) -> Self {
        self.manual_lock = true;
        self
    }

    /// Shift length in hours.
    #[inline]
    pub fn hours(&self) -> f64 {
        self.window.hours()
    }

    /// Whether this assignment is for a night shift.
    #[inline]
    pub fn is_night(&self) -> bool {
        self.category.is_night()
    }
}

/// Telemetry recorded for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTelemetry {
    /// Wall-clock runtime of the strategy (ms).
    pub runtime_ms: u64,
    /// Iterations/nodes/generations performed.
    pub iterations: u64,
    /// Budget exhausted before convergence.
    pub truncated: bool,
    /// Strategy fell back to its greedy seed.
    pub fallback: bool,
}

/// A complete week schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Schedule ID.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// First day of the horizon (inclusive).
    pub week_start: NaiveDate,
    /// Last day of the horizon (inclusive).
    pub week_end: NaiveDate,
    /// Rule set used.
    pub rule_set_id: String,
    /// Rule set version used.
    pub rule_set_version: u32,
    /// Algorithm used.
    pub algorithm: Algorithm,
    /// Employee or team rostering.
    #[serde(default)]
    pub mode: AssignmentMode,
    /// Lifecycle status.
    pub status: ScheduleStatus,
    /// Aggregate score (higher = better).
    pub score: f64,
    /// Violated hard rule IDs.
    #[serde(default)]
    pub violated_hard: Vec<String>,
    /// Violated soft rule IDs.
    #[serde(default)]
    pub violated_soft: Vec<String>,
    /// Strategy telemetry.
    #[serde(default)]
    pub telemetry: RunTelemetry,
    /// Slot assignments.
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    /// Demand slots left unfilled.
    #[serde(default)]
    pub unfilled: Vec<Slot>,
    /// Whole schedule held by a manual editor.
    #[serde(default)]
    pub locked_for_edit: bool,
}

impl Schedule {
    /// Creates an empty draft schedule.
    pub fn new(
        tenant_id: impl Into<String>,
        week_start: NaiveDate,
        week_end: NaiveDate,
        algorithm: Algorithm,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            week_start,
            week_end,
            rule_set_id: String::new(),
            rule_set_version: 0,
            algorithm,
            mode: AssignmentMode::Employee,
            status: ScheduleStatus::Draft,
            score: 0.0,
            violated_hard: Vec::new(),
            violated_soft: Vec::new(),
            telemetry: RunTelemetry::default(),
            assignments: Vec::new(),
            unfilled: Vec::new(),
            locked_for_edit: false,
        }
    }

    /// Records the rule set used.
    pub fn with_rule_set(mut self, id: impl Into<String>, version: u32) -> Self {
        self.rule_set_id = id.into();
        self.rule_set_version = version;
        self
    }

    pub fn with_mode(mut self, mode: AssignmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Adds an assignment, claiming it for this schedule.
    pub fn add_assignment(&mut self, mut assignment: Assignment) {
        assignment.schedule_id = Some(self.id.clone());
        self.assignments.push(assignment);
    }

    /// Moves the schedule through its lifecycle.
    pub fn transition(&mut self, next: ScheduleStatus) -> Result<(), SchedulerError> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulerError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// All assignments held by an assignee, ordered by start.
    pub fn assignments_for(&self, assignee: &Assignee) -> Vec<&Assignment> {
        let mut found: Vec<&Assignment> = self
            .assignments
            .iter()
            .filter(|a| &a.assignee == assignee)
            .collect();
        found.sort_by_key(|a| a.window.start);
        found
    }

    /// Whether `date` lies in the horizon.
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        date >= self.week_start && date <= self.week_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn slot(day: u32, tpl: &str) -> Slot {
        let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        Slot {
            id: Slot::make_id(d(day), tpl, 0),
            date: d(day),
            template_id: tpl.into(),
            index: 0,
            category: ShiftCategory::Day,
            window: ShiftWindow::on_date(d(day), start, end),
            required_roles: Vec::new(),
            team_id: None,
            branch_id: None,
            priority: 0,
        }
    }

    fn sample_schedule() -> Schedule {
        let mut s = Schedule::new("t1", d(3), d(9), Algorithm::Greedy);
        s.add_assignment(Assignment::for_slot(&slot(4, "day"), Assignee::Employee("b".into())));
        s.add_assignment(Assignment::for_slot(&slot(3, "day"), Assignee::Employee("b".into())));
        s.add_assignment(
            Assignment::for_slot(&slot(3, "late"), Assignee::Employee("a".into())).locked(),
        );
        s
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("greedy".parse::<Algorithm>().unwrap(), Algorithm::Greedy);
        assert_eq!("ILP".parse::<Algorithm>().unwrap(), Algorithm::Constraint);
        assert_eq!(
            "simulated-annealing".parse::<Algorithm>().unwrap(),
            Algorithm::SimulatedAnnealing
        );
        assert_eq!("score_rank".parse::<Algorithm>().unwrap(), Algorithm::ScoreRank);
        assert!("tabu".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut s = sample_schedule();
        assert!(s.transition(ScheduleStatus::Approved).is_err());
        s.transition(ScheduleStatus::PendingApproval).unwrap();
        s.transition(ScheduleStatus::Approved).unwrap();
        assert!(s.status.is_published());
        s.transition(ScheduleStatus::Active).unwrap();
        s.transition(ScheduleStatus::Archived).unwrap();
        assert!(s.transition(ScheduleStatus::Draft).is_err());
    }

    #[test]
    fn test_rejected_can_return_to_draft() {
        let mut s = sample_schedule();
        s.transition(ScheduleStatus::PendingApproval).unwrap();
        s.transition(ScheduleStatus::Rejected).unwrap();
        s.transition(ScheduleStatus::Draft).unwrap();
        assert_eq!(s.status, ScheduleStatus::Draft);
    }

    #[test]
    fn test_add_assignment_claims_schedule() {
        let s = sample_schedule();
        assert!(s
            .assignments
            .iter()
            .all(|a| a.schedule_id.as_deref() == Some(s.id.as_str())));
    }

    #[test]
    fn test_assignments_for_sorted() {
        let s = sample_schedule();
        let b = s.assignments_for(&Assignee::Employee("b".into()));
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].date, d(3));
        assert_eq!(b[1].date, d(4));
    }

    #[test]
    fn test_slot_id_format() {
        assert_eq!(Slot::make_id(d(3), "night", 1), "2025-03-03:night:1");
    }
}

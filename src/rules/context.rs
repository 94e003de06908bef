//! Inputs the rule engine needs beyond the assignments themselves.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{
    Assignee, Employee, EmployeeAvailability, RuleException, ShiftWindow, Slot, Team,
};

/// State carried over from earlier schedules.
///
/// Keys are assignee IDs. Employee and team runs build separate contexts,
/// so the two ID spaces never mix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorContext {
    /// Night shifts already worked in the first week of the horizon.
    #[serde(default)]
    pub night_shifts: HashMap<String, u32>,
    /// Hours already worked in the first week of the horizon.
    #[serde(default)]
    pub hours_worked: HashMap<String, f64>,
    /// End of the last shift before the horizon.
    #[serde(default)]
    pub last_shift_end: HashMap<String, NaiveDateTime>,
    /// Consecutive days worked up to the day before the horizon.
    #[serde(default)]
    pub consecutive_days: HashMap<String, u32>,
    /// Fairness scores at run start.
    #[serde(default)]
    pub fairness: HashMap<String, f64>,
}

impl PriorContext {
    pub fn with_night_shifts(mut self, id: impl Into<String>, count: u32) -> Self {
        self.night_shifts.insert(id.into(), count);
        self
    }

    pub fn with_hours_worked(mut self, id: impl Into<String>, hours: f64) -> Self {
        self.hours_worked.insert(id.into(), hours);
        self
    }

    pub fn with_last_shift_end(mut self, id: impl Into<String>, end: NaiveDateTime) -> Self {
        self.last_shift_end.insert(id.into(), end);
        self
    }

    pub fn with_consecutive_days(mut self, id: impl Into<String>, days: u32) -> Self {
        self.consecutive_days.insert(id.into(), days);
        self
    }

    pub fn with_fairness(mut self, id: impl Into<String>, score: f64) -> Self {
        self.fairness.insert(id.into(), score);
        self
    }

    /// Fairness score at run start (0 when unknown).
    pub fn fairness_of(&self, id: &str) -> f64 {
        self.fairness.get(id).copied().unwrap_or(0.0)
    }
}

/// Staffing requirements of one slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotRequirement {
    pub roles: Vec<String>,
    pub team_id: Option<String>,
    pub branch_id: Option<String>,
}

impl From<&Slot> for SlotRequirement {
    fn from(slot: &Slot) -> Self {
        Self {
            roles: slot.required_roles.clone(),
            team_id: slot.team_id.clone(),
            branch_id: slot.branch_id.clone(),
        }
    }
}

/// Read-only context for one evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    week_start: NaiveDate,
    as_of: NaiveDate,
    employees: HashMap<String, Employee>,
    teams: HashMap<String, Team>,
    availability: HashMap<String, Vec<EmployeeAvailability>>,
    exceptions: Vec<RuleException>,
    slots: HashMap<String, SlotRequirement>,
    pool: Vec<Assignee>,
    /// Carry-over state.
    pub prior: PriorContext,
}

impl EvaluationContext {
    /// Creates an empty context for a horizon starting at `week_start`,
    /// judging exception expiry as of `as_of`.
    pub fn new(week_start: NaiveDate, as_of: NaiveDate) -> Self {
        Self {
            week_start,
            as_of,
            employees: HashMap::new(),
            teams: HashMap::new(),
            availability: HashMap::new(),
            exceptions: Vec::new(),
            slots: HashMap::new(),
            pool: Vec::new(),
            prior: PriorContext::default(),
        }
    }

    pub fn with_employees(mut self, employees: impl IntoIterator<Item = Employee>) -> Self {
        for e in employees {
            self.employees.insert(e.id.clone(), e);
        }
        self
    }

    pub fn with_teams(mut self, teams: impl IntoIterator<Item = Team>) -> Self {
        for t in teams {
            self.teams.insert(t.id.clone(), t);
        }
        self
    }

    pub fn with_availability(
        mut self,
        entries: impl IntoIterator<Item = EmployeeAvailability>,
    ) -> Self {
        for entry in entries {
            self.availability
                .entry(entry.employee_id.clone())
                .or_default()
                .push(entry);
        }
        self
    }

    /// Keeps only exceptions active as of the context date.
    pub fn with_exceptions(mut self, exceptions: impl IntoIterator<Item = RuleException>) -> Self {
        let as_of = self.as_of;
        self.exceptions
            .extend(exceptions.into_iter().filter(|e| e.is_active(as_of)));
        self
    }

    /// Registers demand slots (drives coverage and skill checks).
    pub fn with_slots<'a>(mut self, slots: impl IntoIterator<Item = &'a Slot>) -> Self {
        for slot in slots {
            self.slots.insert(slot.id.clone(), SlotRequirement::from(slot));
        }
        self
    }

    /// Registers the assignees that workload balance is measured over.
    pub fn with_pool(mut self, pool: impl IntoIterator<Item = Assignee>) -> Self {
        self.pool.extend(pool);
        self
    }

    pub fn with_prior(mut self, prior: PriorContext) -> Self {
        self.prior = prior;
        self
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// 0-based 7-day block of `date` within the horizon.
    pub fn week_index(&self, date: NaiveDate) -> i64 {
        (date - self.week_start).num_days().div_euclid(7)
    }

    pub fn employee(&self, id: &str) -> Option<&Employee> {
        self.employees.get(id)
    }

    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.get(id)
    }

    pub fn pool(&self) -> &[Assignee] {
        &self.pool
    }

    /// Number of demand slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_ids(&self) -> impl Iterator<Item = &String> {
        self.slots.keys()
    }

    pub fn requirement(&self, slot_id: &str) -> Option<&SlotRequirement> {
        self.slots.get(slot_id)
    }

    /// Availability entries for one employee.
    pub fn availability_of(&self, employee_id: &str) -> &[EmployeeAvailability] {
        self.availability
            .get(employee_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All availability entries.
    pub fn availability(&self) -> impl Iterator<Item = &EmployeeAvailability> {
        self.availability.values().flatten()
    }

    pub fn exceptions(&self) -> &[RuleException] {
        &self.exceptions
    }

    /// Whether an active exception waives `rule_id` for the assignee on `date`.
    pub fn is_suppressed(&self, assignee: &Assignee, rule_id: &str, date: NaiveDate) -> bool {
        self.exceptions
            .iter()
            .any(|e| e.suppresses(assignee, rule_id, date, self.as_of))
    }

    /// Whether the assignee holds every role in `required`.
    ///
    /// A team qualifies through its own roles or any member's roles.
    pub fn has_roles(&self, assignee: &Assignee, required: &[String]) -> bool {
        if required.is_empty() {
            return true;
        }
        match assignee {
            Assignee::Employee(id) => self.employee(id).is_some_and(|e| e.has_roles(required)),
            Assignee::Team(id) => self.team(id).is_some_and(|team| {
                required.iter().all(|role| {
                    team.roles.contains(role)
                        || team
                            .members
                            .iter()
                            .filter_map(|m| self.employee(m))
                            .any(|e| e.roles.contains(role))
                })
            }),
        }
    }

    /// Whether availability blocks the assignee during `window`.
    ///
    /// A team is blocked only when every member is blocked.
    pub fn is_blocked(&self, assignee: &Assignee, window: &ShiftWindow) -> bool {
        match assignee {
            Assignee::Employee(id) => self.employee_blocked(id, window),
            Assignee::Team(id) => self.team(id).is_some_and(|team| {
                !team.members.is_empty()
                    && team.members.iter().all(|m| self.employee_blocked(m, window))
            }),
        }
    }

    fn employee_blocked(&self, employee_id: &str, window: &ShiftWindow) -> bool {
        self.availability_of(employee_id)
            .iter()
            .any(|entry| entry.blocks(window))
    }

    /// Preference signal for `window`.
    ///
    /// `None` when no preference was declared on the shift's date,
    /// `Some(true)` when a preferred window covers the shift.
    pub fn prefers(&self, assignee: &Assignee, window: &ShiftWindow) -> Option<bool> {
        let members: Vec<&str> = match assignee {
            Assignee::Employee(id) => vec![id.as_str()],
            Assignee::Team(id) => self
                .team(id)
                .map(|t| t.members.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        };
        let date = window.start.date();
        let mut declared = false;
        for member in members {
            for entry in self.availability_of(member) {
                if entry.kind != crate::models::AvailabilityKind::Preferred || entry.date != date {
                    continue;
                }
                declared = true;
                if entry.prefers(window) {
                    return Some(true);
                }
            }
        }
        declared.then_some(false)
    }

    /// Whether the employee is pinned on `date`.
    pub fn is_pinned(&self, employee_id: &str, date: NaiveDate) -> bool {
        self.availability_of(employee_id)
            .iter()
            .any(|e| e.pinned && !e.forbidden && e.date == date)
    }

    /// Whether any member of the assignee is pinned on `date`.
    pub fn assignee_pinned(&self, assignee: &Assignee, date: NaiveDate) -> bool {
        match assignee {
            Assignee::Employee(id) => self.is_pinned(id, date),
            Assignee::Team(id) => self
                .team(id)
                .is_some_and(|t| t.members.iter().any(|m| self.is_pinned(m, date))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(d(3), d(1))
            .with_employees(vec![
                Employee::new("a").with_role("nurse"),
                Employee::new("b").with_role("nurse").with_role("icu"),
            ])
            .with_teams(vec![Team::new("t1").with_member("a").with_member("b")])
            .with_availability(vec![
                EmployeeAvailability::blackout("a", d(5)),
                EmployeeAvailability::preferred("b", d(4)).with_window(t(6), t(18)),
            ])
    }

    #[test]
    fn test_team_roles_union_members() {
        let c = ctx();
        let required = vec!["icu".to_string()];
        assert!(!c.has_roles(&Assignee::Employee("a".into()), &required));
        assert!(c.has_roles(&Assignee::Team("t1".into()), &required));
        assert!(!c.has_roles(&Assignee::Employee("ghost".into()), &required));
    }

    #[test]
    fn test_team_blocked_only_if_all_members_blocked() {
        let c = ctx();
        let w = ShiftWindow::on_date(d(5), t(8), t(16));
        assert!(c.is_blocked(&Assignee::Employee("a".into()), &w));
        assert!(!c.is_blocked(&Assignee::Team("t1".into()), &w));
    }

    #[test]
    fn test_prefers_signal() {
        let c = ctx();
        let b = Assignee::Employee("b".into());
        assert_eq!(c.prefers(&b, &ShiftWindow::on_date(d(4), t(8), t(16))), Some(true));
        assert_eq!(c.prefers(&b, &ShiftWindow::on_date(d(4), t(14), t(22))), Some(false));
        assert_eq!(c.prefers(&b, &ShiftWindow::on_date(d(6), t(8), t(16))), None);
    }

    #[test]
    fn test_only_active_exceptions_kept() {
        let a = Assignee::Employee("a".into());
        let c = ctx().with_exceptions(vec![
            RuleException::request("t", a.clone(), "rest", "m").approved_by("hr"),
            RuleException::request("t", a.clone(), "nights", "m"),
        ]);
        assert_eq!(c.exceptions().len(), 1);
        assert!(c.is_suppressed(&a, "rest", d(4)));
        assert!(!c.is_suppressed(&a, "nights", d(4)));
    }

    #[test]
    fn test_week_index() {
        let c = ctx();
        assert_eq!(c.week_index(d(3)), 0);
        assert_eq!(c.week_index(d(9)), 0);
        assert_eq!(c.week_index(d(10)), 1);
        assert_eq!(c.week_index(d(2)), -1);
    }
}

//! Conflict detection.
//!
//! Runs after a schedule is committed (and after every manual edit) and
//! reports residual problems for operators. Detection never blocks
//! persistence.
//!
//! # Checks
//!
//! | Kind | Severity |
//! |------|----------|
//! | Double-booking | `conflict`; `warning` if an active exception waives `no_overlap` |
//! | Rest breach | `conflict` for a hard rest rule; `warning` if soft or waived |
//! | Coverage shortfall | `warning` |
//! | Expired / unapproved exception | `warning` |
//! | Pinned employee not scheduled | `warning` |
//!
//! Pairs covered by an exception are downgraded, never hidden.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::models::{
    Assignee, Assignment, Conflict, ConflictKind, ExceptionStatus, RuleException, Schedule,
    Severity, SlotFlag,
};
use crate::rules::{Rule, RuleKind, NO_OVERLAP};
use crate::scheduler::{expand_slots, ScheduleProblem};

/// Stateless conflict detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detects conflicts in `schedule` against the inputs it was built from.
    pub fn detect(&self, schedule: &Schedule, problem: &ScheduleProblem) -> Vec<Conflict> {
        let mut found = Vec::new();
        let as_of = problem.as_of;
        let exceptions = &problem.exceptions;
        let rest_rule = problem.rule_set.min_rest_rule();

        let mut by_assignee: BTreeMap<&Assignee, Vec<&Assignment>> = BTreeMap::new();
        for a in &schedule.assignments {
            by_assignee.entry(&a.assignee).or_default().push(a);
        }
        for (assignee, list) in by_assignee.iter_mut() {
            list.sort_by_key(|a| (a.window.start, a.window.end));
            self.double_bookings(schedule, assignee, list, exceptions, as_of, &mut found);
            if let Some(rule) = rest_rule {
                let prior_end = problem.prior.last_shift_end.get(assignee.id()).copied();
                self.rest_breaches(schedule, assignee, list, prior_end, rule, exceptions, as_of, &mut found);
            }
        }

        self.coverage(schedule, problem, &mut found);
        self.exception_status(schedule, &by_assignee, exceptions, as_of, &mut found);
        self.pinned(schedule, problem, &mut found);

        debug!(
            schedule_id = %schedule.id,
            conflicts = found.len(),
            "conflict detection finished"
        );
        found
    }

    fn double_bookings(
        &self,
        schedule: &Schedule,
        assignee: &Assignee,
        sorted: &[&Assignment],
        exceptions: &[RuleException],
        as_of: NaiveDate,
        out: &mut Vec<Conflict>,
    ) {
        for (i, a) in sorted.iter().enumerate() {
            for b in sorted[i + 1..].iter().take_while(|b| b.window.start < a.window.end) {
                if !a.window.overlaps(&b.window) {
                    continue;
                }
                let waived = waived(exceptions, assignee, NO_OVERLAP, b.date, as_of);
                let severity = if waived { Severity::Warning } else { Severity::Conflict };
                out.push(
                    Conflict::new(
                        &schedule.id,
                        ConflictKind::DoubleBooked,
                        severity,
                        b.date,
                        format!("{assignee} is double-booked on {} and {}", a.slot_id, b.slot_id),
                    )
                    .with_assignee(assignee.clone())
                    .with_assignments([a.id.clone(), b.id.clone()]),
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn rest_breaches(
        &self,
        schedule: &Schedule,
        assignee: &Assignee,
        sorted: &[&Assignment],
        prior_end: Option<NaiveDateTime>,
        rule: &Rule,
        exceptions: &[RuleException],
        as_of: NaiveDate,
        out: &mut Vec<Conflict>,
    ) {
        let RuleKind::MinRestHours { hours } = rule.kind else {
            return;
        };
        let mut last_end = prior_end;
        let mut last: Option<&Assignment> = None;
        for next in sorted {
            if let Some(end) = last_end {
                let rest = next.window.rest_hours_since(end);
                if (0.0..hours).contains(&rest) {
                    let severity =
                        if rule.hard && !waived(exceptions, assignee, &rule.id, next.date, as_of) {
                            Severity::Conflict
                        } else {
                            Severity::Warning
                        };
                    out.push(
                        Conflict::new(
                            &schedule.id,
                            ConflictKind::RestBreach,
                            severity,
                            next.date,
                            format!("{assignee} rests {rest:.1}h before {} (min {hours}h)", next.slot_id),
                        )
                        .with_assignee(assignee.clone())
                        .with_assignments(last.map(|p| p.id.clone()).into_iter().chain(Some(next.id.clone()))),
                    );
                }
            }
            if last_end.map_or(true, |end| next.window.end > end) {
                last_end = Some(next.window.end);
                last = Some(*next);
            }
        }
    }

    fn coverage(&self, schedule: &Schedule, problem: &ScheduleProblem, out: &mut Vec<Conflict>) {
        let filled: HashSet<&str> = schedule
            .assignments
            .iter()
            .map(|a| a.slot_id.as_str())
            .collect();
        let mut missing: BTreeMap<(NaiveDate, String), (u32, u32)> = BTreeMap::new();
        for slot in expand_slots(problem) {
            let entry = missing.entry((slot.date, slot.template_id.clone())).or_insert((0, 0));
            entry.0 += 1;
            if !filled.contains(slot.id.as_str()) {
                entry.1 += 1;
            }
        }
        for ((date, template), (demanded, unfilled)) in missing {
            if unfilled == 0 {
                continue;
            }
            out.push(Conflict::new(
                &schedule.id,
                ConflictKind::CoverageShortfall,
                Severity::Warning,
                date,
                format!("{template} on {date}: {} of {demanded} filled", demanded - unfilled),
            ));
        }
    }

    fn exception_status(
        &self,
        schedule: &Schedule,
        by_assignee: &BTreeMap<&Assignee, Vec<&Assignment>>,
        exceptions: &[RuleException],
        as_of: NaiveDate,
        out: &mut Vec<Conflict>,
    ) {
        for ex in exceptions {
            let Some(held) = by_assignee.get(&ex.assignee) else {
                continue;
            };
            let in_scope: Vec<&&Assignment> = held
                .iter()
                .filter(|a| ex.date.map_or(true, |d| d == a.date))
                .collect();
            let Some(first) = in_scope.first() else {
                continue;
            };
            let (kind, message) = match ex.status {
                ExceptionStatus::Approved if ex.is_expired(as_of) => (
                    ConflictKind::ExceptionExpired,
                    format!("exception {} for {} expired", ex.id, ex.rule_id),
                ),
                ExceptionStatus::Approved => continue,
                ExceptionStatus::Pending => (
                    ConflictKind::ExceptionUnapproved,
                    format!("exception {} for {} is still pending", ex.id, ex.rule_id),
                ),
                ExceptionStatus::Rejected => (
                    ConflictKind::ExceptionUnapproved,
                    format!("exception {} for {} was rejected", ex.id, ex.rule_id),
                ),
            };
            out.push(
                Conflict::new(&schedule.id, kind, Severity::Warning, first.date, message)
                    .with_assignee(ex.assignee.clone())
                    .with_assignments(in_scope.iter().map(|a| a.id.clone())),
            );
        }
    }

    fn pinned(&self, schedule: &Schedule, problem: &ScheduleProblem, out: &mut Vec<Conflict>) {
        for entry in problem.availability.iter().filter(|e| e.pinned) {
            if !schedule.covers_date(entry.date) {
                continue;
            }
            let scheduled = schedule.assignments.iter().any(|a| {
                a.date == entry.date
                    && match &a.assignee {
                        Assignee::Employee(id) => id == &entry.employee_id,
                        Assignee::Team(id) => problem
                            .team(id)
                            .is_some_and(|t| t.members.contains(&entry.employee_id)),
                    }
            });
            if !scheduled {
                out.push(
                    Conflict::new(
                        &schedule.id,
                        ConflictKind::PinnedNotScheduled,
                        Severity::Warning,
                        entry.date,
                        format!("{} is pinned on {} but not scheduled", entry.employee_id, entry.date),
                    )
                    .with_assignee(Assignee::Employee(entry.employee_id.clone())),
                );
            }
        }
    }
}

fn waived(
    exceptions: &[RuleException],
    assignee: &Assignee,
    rule_id: &str,
    date: NaiveDate,
    as_of: NaiveDate,
) -> bool {
    exceptions
        .iter()
        .any(|e| e.suppresses(assignee, rule_id, date, as_of))
}

/// Replaces every assignment's flags with the conflicts that name it.
pub fn annotate(schedule: &mut Schedule, conflicts: &[Conflict]) {
    for assignment in &mut schedule.assignments {
        assignment.flags = conflicts
            .iter()
            .filter(|c| c.assignment_ids.contains(&assignment.id))
            .map(|c| SlotFlag {
                severity: c.severity,
                code: c.kind.code().to_string(),
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Algorithm, DemandRequirement, Employee, EmployeeAvailability, ShiftCategory, ShiftTemplate,
    };
    use crate::rules::{PriorContext, RuleSet};
    use crate::scheduler::expand_slots;
    use chrono::NaiveTime;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn problem() -> ScheduleProblem {
        let rules = RuleSet::new("rs", "t1")
            .with_rule(Rule::hard("rest", RuleKind::MinRestHours { hours: 12.0 }));
        ScheduleProblem::new("t1", d(3), d(4), rules)
            .with_employees(["a", "b"].map(Employee::new))
            .with_template(ShiftTemplate::new("day", t(8), t(16), ShiftCategory::Day))
            .with_template(ShiftTemplate::new("late", t(14), t(22), ShiftCategory::Evening))
            .with_demand(DemandRequirement::every_day("day", 1))
            .with_demand(DemandRequirement::every_day("late", 1))
    }

    fn schedule_with(problem: &ScheduleProblem, picks: &[(usize, &str)]) -> Schedule {
        let slots = expand_slots(problem);
        let mut s = Schedule::new("t1", problem.week_start, problem.week_end, Algorithm::Manual);
        for (i, who) in picks {
            s.add_assignment(Assignment::for_slot(&slots[*i], Assignee::Employee((*who).into())));
        }
        s
    }

    fn kinds(conflicts: &[Conflict]) -> Vec<(ConflictKind, Severity)> {
        conflicts.iter().map(|c| (c.kind, c.severity)).collect()
    }

    #[test]
    fn test_double_booking_is_conflict() {
        let p = problem();
        // Slots: 03 day, 03 late, 04 day, 04 late.
        let s = schedule_with(&p, &[(0, "a"), (1, "a"), (2, "b"), (3, "b")]);
        let found = ConflictDetector::new().detect(&s, &p);
        assert!(kinds(&found).contains(&(ConflictKind::DoubleBooked, Severity::Conflict)));
    }

    #[test]
    fn test_exception_downgrades_double_booking() {
        let a = Assignee::Employee("a".into());
        let p = problem().with_exception(
            RuleException::request("t1", a, NO_OVERLAP, "mgr")
                .on_date(d(3))
                .approved_by("boss"),
        );
        let s = schedule_with(&p, &[(0, "a"), (1, "a"), (2, "b"), (3, "b")]);
        let found = ConflictDetector::new().detect(&s, &p);
        let double = found
            .iter()
            .find(|c| c.kind == ConflictKind::DoubleBooked)
            .unwrap();
        assert_eq!(double.severity, Severity::Warning);
    }

    #[test]
    fn test_rest_breach() {
        let p = problem();
        // b: 03 late ends 22:00, 04 day starts 08:00 -> 10h rest.
        let s = schedule_with(&p, &[(0, "a"), (1, "b"), (2, "b"), (3, "a")]);
        let found = ConflictDetector::new().detect(&s, &p);
        let rest: Vec<_> = found
            .iter()
            .filter(|c| c.kind == ConflictKind::RestBreach)
            .collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].severity, Severity::Conflict);
        assert_eq!(rest[0].assignee, Some(Assignee::Employee("b".into())));
    }

    #[test]
    fn test_rest_breach_against_previous_week() {
        // a finished a night at 02:00 on the 3rd; the 08:00 day slot leaves 6h.
        let p = problem().with_prior(
            PriorContext::default().with_last_shift_end("a", d(3).and_time(t(2))),
        );
        let s = schedule_with(&p, &[(0, "a"), (1, "b"), (3, "a")]);
        let found = ConflictDetector::new().detect(&s, &p);
        let rest: Vec<_> = found
            .iter()
            .filter(|c| c.kind == ConflictKind::RestBreach)
            .collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].date, d(3));
        assert_eq!(rest[0].assignee, Some(Assignee::Employee("a".into())));
        assert_eq!(rest[0].severity, Severity::Conflict);
    }

    #[test]
    fn test_hard_rest_rule_wins_over_soft() {
        let rules = RuleSet::new("rs", "t1")
            .with_rule(Rule::soft("rest_pref", RuleKind::MinRestHours { hours: 14.0 }, 1.0))
            .with_rule(Rule::hard("rest", RuleKind::MinRestHours { hours: 12.0 }));
        let p = ScheduleProblem { rule_set: rules, ..problem() };
        let s = schedule_with(&p, &[(0, "a"), (1, "b"), (2, "b"), (3, "a")]);
        let found = ConflictDetector::new().detect(&s, &p);
        let rest = found
            .iter()
            .find(|c| c.kind == ConflictKind::RestBreach)
            .unwrap();
        assert_eq!(rest.severity, Severity::Conflict);
        assert!(rest.message.contains("min 12h"));
    }

    #[test]
    fn test_coverage_shortfall_warning() {
        let p = problem();
        let s = schedule_with(&p, &[(0, "a"), (3, "b")]);
        let found = ConflictDetector::new().detect(&s, &p);
        let shortfalls: Vec<_> = found
            .iter()
            .filter(|c| c.kind == ConflictKind::CoverageShortfall)
            .collect();
        assert_eq!(shortfalls.len(), 2);
        assert!(shortfalls.iter().all(|c| c.severity == Severity::Warning));
    }

    #[test]
    fn test_expired_and_pending_exceptions() {
        let a = Assignee::Employee("a".into());
        let p = problem()
            .with_exception(
                RuleException::request("t1", a.clone(), "rest", "mgr")
                    .valid_until(d(1))
                    .approved_by("boss"),
            )
            .with_exception(RuleException::request("t1", a, NO_OVERLAP, "mgr").on_date(d(4)));
        let s = schedule_with(&p, &[(0, "a"), (1, "b"), (2, "b"), (3, "a")]);
        let found = ConflictDetector::new().detect(&s, &p);
        let k = kinds(&found);
        assert!(k.contains(&(ConflictKind::ExceptionExpired, Severity::Warning)));
        assert!(k.contains(&(ConflictKind::ExceptionUnapproved, Severity::Warning)));
    }

    #[test]
    fn test_pinned_not_scheduled() {
        let p = problem().with_availability(vec![EmployeeAvailability::preferred("a", d(4)).pinned()]);
        let s = schedule_with(&p, &[(0, "a"), (1, "b"), (2, "b")]);
        let found = ConflictDetector::new().detect(&s, &p);
        assert!(kinds(&found).contains(&(ConflictKind::PinnedNotScheduled, Severity::Warning)));
    }

    #[test]
    fn test_annotate_sets_flags() {
        let p = problem();
        let mut s = schedule_with(&p, &[(0, "a"), (1, "a"), (2, "b")]);
        let found = ConflictDetector::new().detect(&s, &p);
        annotate(&mut s, &found);
        assert!(s.assignments[0].flags.iter().any(|f| f.code == "double_booked"));
        assert!(s.assignments[2].flags.is_empty());
    }
}

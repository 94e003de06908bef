//! Rule evaluation.
//!
//! The engine is stateless: every call takes the full assignment set, the
//! typed rule set and an [`EvaluationContext`].
//!
//! # Score Convention
//! Higher is better. A schedule with no violations and full coverage
//! scores `0.0`:
//!
//! ```text
//! score = -(hard_count * hard_penalty) - sum(soft penalties) - unfilled * coverage_penalty
//! ```
//!
//! # Suppression
//! A hard violation attributed to `(assignee, rule_id, date)` is dropped
//! when an approved, unexpired exception matches it. Soft penalties are
//! never suppressed.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::{EvaluationContext, Rule, RuleDefaults, RuleKind, RuleSet, AVAILABILITY, NO_OVERLAP};
use crate::models::{Assignee, Assignment};

/// A hard rule breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardViolation {
    pub rule_id: String,
    /// `None` for roster-wide rules.
    pub assignee: Option<Assignee>,
    pub date: NaiveDate,
    pub assignment_ids: Vec<String>,
    pub message: String,
}

/// A soft rule penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftViolation {
    pub rule_id: String,
    pub assignee: Option<Assignee>,
    pub date: NaiveDate,
    /// `weight * excess`.
    pub penalty: f64,
}

/// Result of evaluating one assignment set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub violated_hard: Vec<HardViolation>,
    pub violated_soft: Vec<SoftViolation>,
    /// Demand slots without an assignment.
    pub unfilled: usize,
    /// IDs of the unfilled slots, sorted.
    pub unfilled_slots: Vec<String>,
    /// Aggregate score (higher is better).
    pub score: f64,
}

impl Evaluation {
    /// No hard violations (coverage gaps are allowed).
    pub fn is_hard_feasible(&self) -> bool {
        self.violated_hard.is_empty()
    }

    /// No hard violations and full coverage.
    pub fn is_feasible(&self) -> bool {
        self.violated_hard.is_empty() && self.unfilled == 0
    }

    /// Distinct violated hard rule IDs, sorted.
    pub fn hard_rule_ids(&self) -> Vec<String> {
        dedup(self.violated_hard.iter().map(|v| v.rule_id.clone()))
    }

    /// Distinct violated soft rule IDs, sorted.
    pub fn soft_rule_ids(&self) -> Vec<String> {
        dedup(self.violated_soft.iter().map(|v| v.rule_id.clone()))
    }

    /// Sum of soft penalties.
    pub fn soft_penalty(&self) -> f64 {
        self.violated_soft.iter().map(|v| v.penalty).sum()
    }
}

fn dedup(ids: impl Iterator<Item = String>) -> Vec<String> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

/// The rule engine.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    defaults: RuleDefaults,
}

/// Borrowed view of a rule (built-ins have no `Rule` value).
#[derive(Clone, Copy)]
struct RuleRef<'a> {
    id: &'a str,
    hard: bool,
    weight: f64,
}

impl<'a> From<&'a Rule> for RuleRef<'a> {
    fn from(rule: &'a Rule) -> Self {
        Self {
            id: &rule.id,
            hard: rule.hard,
            weight: rule.weight,
        }
    }
}

const BUILTIN_OVERLAP: RuleRef<'static> = RuleRef {
    id: NO_OVERLAP,
    hard: true,
    weight: 1.0,
};

const BUILTIN_AVAILABILITY: RuleRef<'static> = RuleRef {
    id: AVAILABILITY,
    hard: true,
    weight: 1.0,
};

#[derive(Default)]
struct Findings {
    hard: Vec<HardViolation>,
    soft: Vec<SoftViolation>,
}

impl Findings {
    #[allow(clippy::too_many_arguments)]
    fn breach(
        &mut self,
        ctx: &EvaluationContext,
        rule: RuleRef<'_>,
        assignee: Option<&Assignee>,
        date: NaiveDate,
        assignments: &[&Assignment],
        excess: f64,
        message: impl FnOnce() -> String,
    ) {
        if rule.hard {
            if assignee.is_some_and(|a| ctx.is_suppressed(a, rule.id, date)) {
                return;
            }
            self.hard.push(HardViolation {
                rule_id: rule.id.to_string(),
                assignee: assignee.cloned(),
                date,
                assignment_ids: assignments.iter().map(|a| a.id.clone()).collect(),
                message: message(),
            });
        } else {
            self.soft.push(SoftViolation {
                rule_id: rule.id.to_string(),
                assignee: assignee.cloned(),
                date,
                penalty: rule.weight * excess,
            });
        }
    }
}

impl RuleEngine {
    /// Creates an engine with the given fallbacks and penalties.
    pub fn new(defaults: RuleDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RuleDefaults {
        &self.defaults
    }

    /// Evaluates a full assignment set.
    pub fn evaluate(
        &self,
        assignments: &[Assignment],
        rules: &RuleSet,
        ctx: &EvaluationContext,
    ) -> Evaluation {
        let mut findings = Findings::default();

        let mut by_assignee: BTreeMap<&Assignee, Vec<&Assignment>> = BTreeMap::new();
        for a in assignments {
            by_assignee.entry(&a.assignee).or_default().push(a);
        }
        for (assignee, list) in by_assignee.iter_mut() {
            list.sort_by_key(|a| (a.window.start, a.window.end));
            self.check_assignee(assignee, list, rules, ctx, &mut findings);
        }

        for rule in &rules.rules {
            if let RuleKind::BalancedWorkload { tolerance } = rule.kind {
                check_balance(rule, tolerance, &by_assignee, ctx, &mut findings);
            }
        }

        let filled: HashSet<&str> = assignments.iter().map(|a| a.slot_id.as_str()).collect();
        let mut unfilled_slots: Vec<String> = ctx
            .slot_ids()
            .filter(|id| !filled.contains(id.as_str()))
            .cloned()
            .collect();
        unfilled_slots.sort();

        let unfilled = unfilled_slots.len();
        let score = -(findings.hard.len() as f64 * self.defaults.hard_penalty)
            - findings.soft.iter().map(|v| v.penalty).sum::<f64>()
            - unfilled as f64 * self.defaults.coverage_penalty;

        Evaluation {
            violated_hard: findings.hard,
            violated_soft: findings.soft,
            unfilled,
            unfilled_slots,
            score,
        }
    }

    /// Whether adding `candidate` to `current` introduces a hard violation
    /// for the candidate's assignee.
    ///
    /// Violations already present (e.g. from locked assignments) do not
    /// count against the candidate.
    pub fn admits(
        &self,
        current: &[Assignment],
        candidate: &Assignment,
        rules: &RuleSet,
        ctx: &EvaluationContext,
    ) -> bool {
        let mut mine: Vec<&Assignment> = current
            .iter()
            .filter(|a| a.assignee == candidate.assignee && a.id != candidate.id)
            .collect();
        mine.sort_by_key(|a| (a.window.start, a.window.end));
        let before = self.hard_count(&candidate.assignee, &mine, rules, ctx);

        let at = mine.partition_point(|a| {
            (a.window.start, a.window.end) <= (candidate.window.start, candidate.window.end)
        });
        mine.insert(at, candidate);
        let after = self.hard_count(&candidate.assignee, &mine, rules, ctx);
        after <= before
    }

    /// Hard violations attributable to one assignee's sorted assignments.
    pub fn hard_count(
        &self,
        assignee: &Assignee,
        sorted: &[&Assignment],
        rules: &RuleSet,
        ctx: &EvaluationContext,
    ) -> usize {
        let mut findings = Findings::default();
        self.check_assignee(assignee, sorted, rules, ctx, &mut findings);
        findings.hard.len()
    }

    fn check_assignee(
        &self,
        assignee: &Assignee,
        sorted: &[&Assignment],
        rules: &RuleSet,
        ctx: &EvaluationContext,
        out: &mut Findings,
    ) {
        check_overlap(assignee, sorted, ctx, out);
        check_availability(assignee, sorted, ctx, out);

        for rule in &rules.rules {
            match rule.kind {
                RuleKind::MaxConsecutiveShifts { max_days } => {
                    check_consecutive(rule, max_days, assignee, sorted, ctx, out)
                }
                RuleKind::MaxNightShiftsPerWeek { max } => {
                    check_nights(rule, max, assignee, sorted, ctx, out)
                }
                RuleKind::MinRestHours { hours } => {
                    check_rest(rule, hours, assignee, sorted, ctx, out)
                }
                RuleKind::RequiredSkillMatch => check_skills(rule, assignee, sorted, ctx, out),
                RuleKind::MaxHoursPerWeek { max_hours } => {
                    check_hours(rule, max_hours, assignee, sorted, ctx, out)
                }
                RuleKind::RespectPreferences => {
                    check_preferences(rule, assignee, sorted, ctx, out)
                }
                RuleKind::BalancedWorkload { .. } => {}
            }
        }
    }
}

fn check_overlap(
    assignee: &Assignee,
    sorted: &[&Assignment],
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            if b.window.start >= a.window.end {
                break;
            }
            out.breach(ctx, BUILTIN_OVERLAP, Some(assignee), b.date, &[*a, *b], 1.0, || {
                format!("{assignee} is double-booked on {} ({} / {})", b.date, a.id, b.id)
            });
        }
    }
}

fn check_availability(
    assignee: &Assignee,
    sorted: &[&Assignment],
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    for a in sorted {
        if ctx.is_blocked(assignee, &a.window) {
            out.breach(ctx, BUILTIN_AVAILABILITY, Some(assignee), a.date, &[*a], 1.0, || {
                format!("{assignee} is unavailable for {} on {}", a.template_id, a.date)
            });
        }
    }
}

fn check_consecutive(
    rule: &Rule,
    max_days: u32,
    assignee: &Assignee,
    sorted: &[&Assignment],
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    let days: BTreeSet<NaiveDate> = sorted.iter().map(|a| a.date).collect();
    let carried = ctx
        .prior
        .consecutive_days
        .get(assignee.id())
        .copied()
        .unwrap_or(0);

    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous {
            Some(p) if p + Duration::days(1) == day => run + 1,
            _ if day == ctx.week_start() => carried + 1,
            _ => 1,
        };
        previous = Some(day);
        if run > max_days {
            let on_day: Vec<&Assignment> =
                sorted.iter().copied().filter(|a| a.date == day).collect();
            out.breach(ctx, rule.into(), Some(assignee), day, &on_day, 1.0, || {
                format!("{assignee} works {run} consecutive days on {day} (max {max_days})")
            });
        }
    }
}

fn check_nights(
    rule: &Rule,
    max: u32,
    assignee: &Assignee,
    sorted: &[&Assignment],
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    let carried = ctx.prior.night_shifts.get(assignee.id()).copied().unwrap_or(0);
    let mut per_week: HashMap<i64, u32> = HashMap::new();
    for a in sorted.iter().filter(|a| a.is_night()) {
        let week = ctx.week_index(a.date);
        let count = per_week
            .entry(week)
            .or_insert(if week == 0 { carried } else { 0 });
        *count += 1;
        if *count > max {
            let count = *count;
            out.breach(ctx, rule.into(), Some(assignee), a.date, &[*a], 1.0, || {
                format!("{assignee} has {count} night shifts in week {week} (max {max})")
            });
        }
    }
}

fn check_rest(
    rule: &Rule,
    hours: f64,
    assignee: &Assignee,
    sorted: &[&Assignment],
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    let mut last_end = ctx.prior.last_shift_end.get(assignee.id()).copied();
    let mut last: Option<&Assignment> = None;
    for a in sorted {
        if let Some(end) = last_end {
            let rest = a.window.rest_hours_since(end);
            // Overlaps are reported by the double-booking check.
            if (0.0..hours).contains(&rest) {
                let involved: Vec<&Assignment> = last.into_iter().chain(Some(*a)).collect();
                out.breach(ctx, rule.into(), Some(assignee), a.date, &involved, hours - rest, || {
                    format!("{assignee} rests only {rest:.1}h before {} (min {hours}h)", a.id)
                });
            }
        }
        if last_end.map_or(true, |end| a.window.end > end) {
            last_end = Some(a.window.end);
            last = Some(*a);
        }
    }
}

fn check_skills(
    rule: &Rule,
    assignee: &Assignee,
    sorted: &[&Assignment],
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    for a in sorted {
        let Some(req) = ctx.requirement(&a.slot_id) else {
            continue;
        };
        if !ctx.has_roles(assignee, &req.roles) {
            out.breach(ctx, rule.into(), Some(assignee), a.date, &[*a], 1.0, || {
                format!("{assignee} lacks roles {:?} for {}", req.roles, a.slot_id)
            });
        }
    }
}

fn check_hours(
    rule: &Rule,
    max_hours: f64,
    assignee: &Assignee,
    sorted: &[&Assignment],
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    let carried = ctx.prior.hours_worked.get(assignee.id()).copied().unwrap_or(0.0);
    let mut per_week: BTreeMap<i64, (f64, Vec<&Assignment>)> = BTreeMap::new();
    for a in sorted {
        let week = ctx.week_index(a.date);
        let entry = per_week
            .entry(week)
            .or_insert_with(|| (if week == 0 { carried } else { 0.0 }, Vec::new()));
        entry.0 += a.hours();
        entry.1.push(*a);
    }
    for (week, (total, list)) in per_week {
        if total > max_hours {
            let Some(last) = list.last() else { continue };
            out.breach(ctx, rule.into(), Some(assignee), last.date, &list, total - max_hours, || {
                format!("{assignee} works {total:.1}h in week {week} (max {max_hours}h)")
            });
        }
    }
}

fn check_preferences(
    rule: &Rule,
    assignee: &Assignee,
    sorted: &[&Assignment],
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    for a in sorted {
        if ctx.prefers(assignee, &a.window) == Some(false) {
            out.breach(ctx, rule.into(), Some(assignee), a.date, &[*a], 1.0, || {
                format!("{} is outside {assignee}'s preferred window", a.id)
            });
        }
    }
}

fn check_balance(
    rule: &Rule,
    tolerance: u32,
    by_assignee: &BTreeMap<&Assignee, Vec<&Assignment>>,
    ctx: &EvaluationContext,
    out: &mut Findings,
) {
    let counts: Vec<usize> = if ctx.pool().is_empty() {
        by_assignee.values().map(Vec::len).collect()
    } else {
        ctx.pool()
            .iter()
            .map(|a| by_assignee.get(a).map_or(0, Vec::len))
            .collect()
    };
    let (Some(max), Some(min)) = (counts.iter().max(), counts.iter().min()) else {
        return;
    };
    let spread = (max - min) as u32;
    if spread > tolerance {
        out.breach(
            ctx,
            rule.into(),
            None,
            ctx.week_start(),
            &[],
            f64::from(spread - tolerance),
            || format!("shift counts spread by {spread} (tolerance {tolerance})"),
        );
    }
}

//! Greedy constructive rostering.
//!
//! # Algorithm
//!
//! 1. Expand demand into slots and sort them (see [`Plan`]).
//! 2. For each open slot, rank its eligible candidates: pinned first,
//!    then lowest running fairness load, then preference match, then ID.
//! 3. Commit the first candidate the rule engine admits (no new hard
//!    violation). If none is admitted the slot stays unfilled.
//! 4. Add the shift's fairness delta to the winner's running load.
//!
//! # Complexity
//! O(s * c * k) where s = slots, c = candidates per slot and k = the
//! candidate's assignments in the horizon.

use std::collections::HashMap;

use tracing::debug;

use super::{Budget, Plan, ScheduleProblem, SchedulingStrategy, StrategyOutcome};
use crate::error::SchedulerError;
use crate::fairness::{FairnessTracker, FairnessWeights};
use crate::models::{Algorithm, Assignee, Assignment, RunTelemetry};
use crate::ranking::{Ranker, RankingContext};
use crate::rules::{RuleEngine, RuleSet};

/// Greedy strategy.
///
/// # Example
///
/// ```
/// use chrono::{NaiveDate, NaiveTime};
/// use u_roster::models::{DemandRequirement, Employee, ShiftCategory, ShiftTemplate};
/// use u_roster::rules::{RuleDefaults, RuleEngine, RuleSet};
/// use u_roster::scheduler::{Budget, GreedyStrategy, ScheduleProblem, SchedulingStrategy};
///
/// let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
/// let rules = RuleSet::standard("std", "t1", &RuleDefaults::default());
/// let problem = ScheduleProblem::new("t1", monday, monday, rules)
///     .with_employee(Employee::new("ana"))
///     .with_template(ShiftTemplate::new(
///         "day",
///         NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
///         NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
///         ShiftCategory::Day,
///     ))
///     .with_demand(DemandRequirement::every_day("day", 1));
///
/// let greedy = GreedyStrategy::new(RuleEngine::default(), Default::default());
/// let outcome = greedy.generate(&problem, &Budget::unlimited()).unwrap();
/// assert_eq!(outcome.assignments.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct GreedyStrategy {
    engine: RuleEngine,
    weights: FairnessWeights,
    ranker: Ranker,
}

impl GreedyStrategy {
    /// Creates a greedy strategy with the standard ranker.
    pub fn new(engine: RuleEngine, weights: FairnessWeights) -> Self {
        Self {
            engine,
            weights,
            ranker: Ranker::standard(),
        }
    }

    /// Replaces the candidate ranker.
    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }
}

impl SchedulingStrategy for GreedyStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Greedy
    }

    fn generate(
        &self,
        problem: &ScheduleProblem,
        budget: &Budget,
    ) -> Result<StrategyOutcome, SchedulerError> {
        let plan = Plan::build(problem);
        let tracker = FairnessTracker::new(self.weights.clone());
        let built = construct(
            &plan,
            &problem.rule_set,
            &self.engine,
            &tracker,
            &self.ranker,
            budget,
        );
        debug!(
            slots = plan.slots.len(),
            filled = built.assignments.len() - plan.fixed.len(),
            truncated = built.truncated,
            "greedy construction finished"
        );
        let telemetry = RunTelemetry {
            iterations: built.iterations,
            truncated: built.truncated,
            ..RunTelemetry::default()
        };
        Ok(StrategyOutcome::assemble(
            &plan,
            &self.engine,
            &problem.rule_set,
            built.assignments,
            telemetry,
            budget,
        ))
    }
}

/// Output of a constructive pass.
#[derive(Debug, Clone)]
pub(crate) struct Construction {
    /// Fixed assignments followed by the committed ones.
    pub assignments: Vec<Assignment>,
    pub iterations: u64,
    pub truncated: bool,
}

/// Running fairness load at the start of construction: prior scores plus
/// the deltas of the fixed assignments.
pub(crate) fn starting_load(plan: &Plan, tracker: &FairnessTracker) -> HashMap<Assignee, f64> {
    let mut load = plan.initial_load();
    for a in &plan.fixed {
        *load.entry(a.assignee.clone()).or_insert(0.0) += tracker.delta_for_assignment(a);
    }
    load
}

/// Night shifts held by each assignee among `assignments`.
pub(crate) fn night_counts(assignments: &[Assignment]) -> HashMap<Assignee, u32> {
    let mut nights = HashMap::new();
    for a in assignments.iter().filter(|a| a.is_night()) {
        *nights.entry(a.assignee.clone()).or_insert(0) += 1;
    }
    nights
}

/// Ranked first-fit over the plan's open slots.
pub(crate) fn construct(
    plan: &Plan,
    rules: &RuleSet,
    engine: &RuleEngine,
    tracker: &FairnessTracker,
    ranker: &Ranker,
    budget: &Budget,
) -> Construction {
    let mut assignments = plan.fixed.clone();
    let mut load = starting_load(plan, tracker);
    let mut nights = night_counts(&assignments);
    let mut iterations = 0u64;
    let mut truncated = false;

    for &i in &plan.open {
        if budget.exhausted(iterations) {
            truncated = true;
            break;
        }
        iterations += 1;

        let slot = &plan.slots[i];
        let chosen = {
            let ctx = RankingContext::new(slot, &plan.context, &load, &nights);
            ranker
                .rank(&plan.candidates[i], &ctx)
                .into_iter()
                .map(|c| Assignment::for_slot(slot, c.clone()))
                .find(|a| engine.admits(&assignments, a, rules, &plan.context))
        };

        if let Some(assignment) = chosen {
            *load.entry(assignment.assignee.clone()).or_insert(0.0) +=
                tracker.delta_for_assignment(&assignment);
            if assignment.is_night() {
                *nights.entry(assignment.assignee.clone()).or_insert(0) += 1;
            }
            assignments.push(assignment);
        }
    }

    Construction {
        assignments,
        iterations,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DemandRequirement, Employee, EmployeeAvailability, ShiftCategory, ShiftTemplate,
    };
    use crate::rules::{PriorContext, Rule, RuleDefaults, RuleKind};
    use chrono::{NaiveDate, NaiveTime};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn night_problem() -> ScheduleProblem {
        let rules = RuleSet::new("rs", "t1")
            .with_rule(Rule::hard("nights", RuleKind::MaxNightShiftsPerWeek { max: 2 }));
        ScheduleProblem::new("t1", d(3), d(9), rules)
            .with_employees(["a", "b", "c"].map(Employee::new))
            .with_template(ShiftTemplate::new("night", t(22), t(6), ShiftCategory::Night))
            .with_demand(DemandRequirement::every_day("night", 1))
    }

    fn greedy() -> GreedyStrategy {
        GreedyStrategy::new(RuleEngine::new(RuleDefaults::default()), FairnessWeights::default())
    }

    #[test]
    fn test_night_cap_leaves_one_unfilled() {
        let problem = night_problem().with_availability(vec![
            EmployeeAvailability::blackout("a", d(5)),
            EmployeeAvailability::blackout("a", d(6)),
        ]);
        let outcome = greedy().generate(&problem, &Budget::unlimited()).unwrap();

        assert_eq!(outcome.assignments.len(), 6);
        assert_eq!(outcome.unfilled.len(), 1);
        assert!(outcome.evaluation.is_hard_feasible());
        assert!(!outcome.is_complete());
        for a in &outcome.assignments {
            assert!(!(a.assignee == Assignee::Employee("a".into()) && (a.date == d(5) || a.date == d(6))));
        }
    }

    #[test]
    fn test_load_balancing_spreads_shifts() {
        let outcome = greedy()
            .generate(&night_problem(), &Budget::unlimited())
            .unwrap();
        let nights = night_counts(&outcome.assignments);
        assert!(nights.values().all(|&n| n == 2));
    }

    #[test]
    fn test_prior_fairness_orders_first_pick() {
        let problem = night_problem().with_prior(
            PriorContext::default()
                .with_fairness("a", 5.0)
                .with_fairness("b", 0.0)
                .with_fairness("c", 1.0),
        );
        let outcome = greedy().generate(&problem, &Budget::unlimited()).unwrap();
        let first = outcome.assignments.iter().find(|a| a.date == d(3)).unwrap();
        assert_eq!(first.assignee, Assignee::Employee("b".into()));
    }

    #[test]
    fn test_locked_assignment_preserved() {
        let base = night_problem();
        let plan = Plan::build(&base);
        let locked = Assignment::for_slot(&plan.slots[0], Assignee::Employee("c".into())).locked();
        let problem = base.with_existing(vec![locked.clone()]);

        let outcome = greedy().generate(&problem, &Budget::unlimited()).unwrap();
        let kept = outcome
            .assignments
            .iter()
            .find(|a| a.slot_id == locked.slot_id)
            .unwrap();
        assert_eq!(kept.assignee, locked.assignee);
        assert_eq!(kept.window, locked.window);
        assert!(kept.manual_lock);
        assert_eq!(
            outcome.assignments.iter().filter(|a| a.slot_id == locked.slot_id).count(),
            1
        );
    }

    #[test]
    fn test_exhausted_budget_truncates() {
        let budget = Budget::unlimited().with_max_iterations(2);
        let outcome = greedy().generate(&night_problem(), &budget).unwrap();
        assert!(outcome.telemetry.truncated);
        assert_eq!(outcome.assignments.len(), 2);
        assert_eq!(outcome.unfilled.len(), 5);
    }

    #[test]
    fn test_deterministic() {
        let p = night_problem();
        let a = greedy().generate(&p, &Budget::unlimited()).unwrap();
        let b = greedy().generate(&p, &Budget::unlimited()).unwrap();
        let pick = |o: &StrategyOutcome| {
            o.assignments
                .iter()
                .map(|a| (a.slot_id.clone(), a.assignee.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(&a), pick(&b));
    }
}

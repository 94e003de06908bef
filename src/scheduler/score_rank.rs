//! Fairness-score ranked rostering.
//!
//! # Algorithm
//!
//! Slots are filled in plan order. For each slot the eligible, admitted
//! candidate with the lowest current fairness score wins (ties by ID).
//! The winner's delta is committed to a speculative copy of the tracker,
//! so later slots in the same run see the updated score. The real
//! tracker only changes when the orchestrator commits a completed run.

use tracing::debug;

use super::{Budget, Plan, ScheduleProblem, SchedulingStrategy, StrategyOutcome};
use crate::error::SchedulerError;
use crate::fairness::{FairnessScore, FairnessTracker, FairnessWeights, ScoreKey};
use crate::models::{Algorithm, Assignment, RunTelemetry};
use crate::rules::RuleEngine;

/// Score-rank strategy.
#[derive(Debug, Clone)]
pub struct ScoreRankStrategy {
    engine: RuleEngine,
    weights: FairnessWeights,
}

impl ScoreRankStrategy {
    pub fn new(engine: RuleEngine, weights: FairnessWeights) -> Self {
        Self { engine, weights }
    }

    /// Tracker seeded with the prior snapshot of the pool.
    fn speculative_tracker(&self, plan: &Plan) -> FairnessTracker {
        let seeded = plan.context.pool().iter().map(|assignee| {
            let key = ScoreKey::from(assignee);
            FairnessScore {
                scope: key.scope,
                id: key.id,
                score: plan.context.prior.fairness_of(assignee.id()),
                total_shifts: 0,
                night_shifts: 0,
                history: Vec::new(),
            }
        });
        let mut tracker = FairnessTracker::from_scores(self.weights.clone(), seeded);
        for fixed in &plan.fixed {
            tracker.commit_assignment(fixed, None);
        }
        tracker
    }
}

impl SchedulingStrategy for ScoreRankStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ScoreRank
    }

    fn generate(
        &self,
        problem: &ScheduleProblem,
        budget: &Budget,
    ) -> Result<StrategyOutcome, SchedulerError> {
        let plan = Plan::build(problem);
        let rules = &problem.rule_set;
        let mut tracker = self.speculative_tracker(&plan);
        let mut assignments = plan.fixed.clone();
        let mut iterations = 0u64;
        let mut truncated = false;

        for &i in &plan.open {
            if budget.exhausted(iterations) {
                truncated = true;
                break;
            }
            iterations += 1;

            let slot = &plan.slots[i];
            let mut ranked: Vec<(f64, &crate::models::Assignee)> = plan.candidates[i]
                .iter()
                .map(|c| (tracker.current_score(&ScoreKey::from(c)), c))
                .collect();
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

            let chosen = ranked
                .into_iter()
                .map(|(_, c)| Assignment::for_slot(slot, c.clone()))
                .find(|a| self.engine.admits(&assignments, a, rules, &plan.context));

            if let Some(assignment) = chosen {
                tracker.commit_assignment(&assignment, None);
                assignments.push(assignment);
            }
        }

        debug!(
            filled = assignments.len() - plan.fixed.len(),
            open = plan.open.len(),
            "score-rank pass finished"
        );
        let telemetry = RunTelemetry {
            iterations,
            truncated,
            ..RunTelemetry::default()
        };
        Ok(StrategyOutcome::assemble(
            &plan,
            &self.engine,
            rules,
            assignments,
            telemetry,
            budget,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Assignee, DemandRequirement, Employee, ShiftCategory, ShiftTemplate};
    use crate::rules::{PriorContext, RuleSet};
    use chrono::{NaiveDate, NaiveTime};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn problem() -> ScheduleProblem {
        ScheduleProblem::new("t1", d(3), d(6), RuleSet::new("rs", "t1"))
            .with_employees(["a", "b"].map(Employee::new))
            .with_template(ShiftTemplate::new("day", t(8), t(16), ShiftCategory::Day))
            .with_template(ShiftTemplate::new("night", t(22), t(6), ShiftCategory::Night))
            .with_demand(DemandRequirement::every_day("day", 1))
            .with_demand(DemandRequirement::every_day("night", 1))
    }

    fn strategy() -> ScoreRankStrategy {
        ScoreRankStrategy::new(RuleEngine::default(), FairnessWeights::default())
    }

    #[test]
    fn test_lowest_score_wins() {
        let p = problem().with_prior(PriorContext::default().with_fairness("a", 3.0));
        let outcome = strategy().generate(&p, &Budget::unlimited()).unwrap();
        let first = &outcome.assignments[0];
        assert_eq!(first.date, d(3));
        assert_eq!(first.assignee, Assignee::Employee("b".into()));
    }

    #[test]
    fn test_scores_even_out() {
        let outcome = strategy().generate(&problem(), &Budget::unlimited()).unwrap();
        assert!(outcome.is_complete());
        let tracker = {
            let mut t = FairnessTracker::default();
            for a in &outcome.assignments {
                t.commit_assignment(a, None);
            }
            t
        };
        let a = tracker.current_score(&ScoreKey::employee("a"));
        let b = tracker.current_score(&ScoreKey::employee("b"));
        // One night (2.0) or day (1.0) apart at most.
        assert!((a - b).abs() <= 2.0 + 1e-9);
    }

    #[test]
    fn test_speculative_copy_has_history() {
        let s = strategy();
        let p = problem();
        let plan = Plan::build(&p);
        let locked = Assignment::for_slot(&plan.slots[0], Assignee::Employee("a".into())).locked();
        let plan = Plan::build(&p.with_existing(vec![locked]));
        let tracker = s.speculative_tracker(&plan);
        let rec = tracker.get(&ScoreKey::employee("a")).unwrap();
        assert_eq!(rec.history.len(), 1);
        assert_eq!(rec.total_shifts, 1);
    }
}

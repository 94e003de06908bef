//! Manual strategy: scores caller-supplied assignments without search.

use super::{Budget, Plan, ScheduleProblem, SchedulingStrategy, StrategyOutcome};
use crate::error::SchedulerError;
use crate::models::{Algorithm, AssignedBy, RunTelemetry};
use crate::rules::RuleEngine;

/// Evaluates `problem.existing` as given.
#[derive(Debug, Clone)]
pub struct ManualStrategy {
    engine: RuleEngine,
}

impl ManualStrategy {
    pub fn new(engine: RuleEngine) -> Self {
        Self { engine }
    }
}

impl SchedulingStrategy for ManualStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Manual
    }

    fn generate(
        &self,
        problem: &ScheduleProblem,
        budget: &Budget,
    ) -> Result<StrategyOutcome, SchedulerError> {
        let plan = Plan::build(problem);
        let assignments = problem
            .existing
            .iter()
            .filter(|a| a.date >= problem.week_start && a.date <= problem.week_end)
            .cloned()
            .map(|a| match a.assigned_by {
                AssignedBy::Algorithm => a.with_assigned_by(AssignedBy::Manual),
                _ => a,
            })
            .collect();
        Ok(StrategyOutcome::assemble(
            &plan,
            &self.engine,
            &problem.rule_set,
            assignments,
            RunTelemetry::default(),
            budget,
        ))
    }
}

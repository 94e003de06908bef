//! Branch-and-bound rostering.
//!
//! # Algorithm
//!
//! Depth-first search over the open slots in plan order. At each slot the
//! branches are the admitted candidates in ranker order, followed by
//! leaving the slot unfilled. A branch is pruned when its optimistic bound
//! cannot beat the incumbent:
//!
//! ```text
//! bound = -(unfilled_so_far * coverage_penalty)
//! ```
//!
//! Every remaining slot is assumed filled at no soft cost, so the bound
//! never underestimates a completion. Complete leaves are scored by the
//! full rule engine.
//!
//! The incumbent starts as the greedy solution, so the search only ever
//! returns something at least as good. When the node limit or the budget
//! stops the search, the best-so-far is returned with `truncated` set;
//! `fallback` is set when the greedy seed was never improved.
//!
//! # Reference
//! Land & Doig (1960), "An Automatic Method of Solving Discrete
//! Programming Problems"

use std::collections::HashMap;

use tracing::debug;

use super::greedy::{construct, night_counts, starting_load};
use super::{Budget, Plan, ScheduleProblem, SchedulingStrategy, StrategyOutcome};
use crate::config::ConstraintConfig;
use crate::error::SchedulerError;
use crate::fairness::{FairnessTracker, FairnessWeights};
use crate::models::{Algorithm, Assignee, Assignment, RunTelemetry};
use crate::ranking::{Ranker, RankingContext};
use crate::rules::{RuleEngine, RuleSet};

/// Exact search strategy with a node limit.
#[derive(Debug, Clone)]
pub struct ConstraintStrategy {
    engine: RuleEngine,
    weights: FairnessWeights,
    config: ConstraintConfig,
    ranker: Ranker,
}

impl ConstraintStrategy {
    pub fn new(engine: RuleEngine, weights: FairnessWeights, config: ConstraintConfig) -> Self {
        Self {
            engine,
            weights,
            config,
            ranker: Ranker::standard(),
        }
    }
}

struct Search<'a> {
    plan: &'a Plan,
    rules: &'a RuleSet,
    engine: &'a RuleEngine,
    tracker: &'a FairnessTracker,
    ranker: &'a Ranker,
    budget: &'a Budget,
    node_limit: u64,
    gap_tolerance: f64,

    assignments: Vec<Assignment>,
    load: HashMap<Assignee, f64>,
    nights: HashMap<Assignee, u32>,
    unfilled: usize,

    best: Vec<Assignment>,
    best_score: f64,
    improved: bool,
    nodes: u64,
    stopped: bool,
}

impl Search<'_> {
    fn should_stop(&mut self) -> bool {
        if !self.stopped
            && (self.nodes >= self.node_limit || self.budget.exhausted(self.nodes))
        {
            self.stopped = true;
        }
        self.stopped
    }

    fn can_beat_incumbent(&self, unfilled: usize) -> bool {
        let bound = -(unfilled as f64) * self.engine.defaults().coverage_penalty;
        let margin = self.gap_tolerance * self.best_score.abs();
        bound > self.best_score + margin + 1e-9
    }

    fn explore(&mut self, depth: usize) {
        if self.should_stop() {
            return;
        }
        self.nodes += 1;

        if depth == self.plan.open.len() {
            let eval = self
                .engine
                .evaluate(&self.assignments, self.rules, &self.plan.context);
            if eval.score > self.best_score + 1e-9 {
                self.best_score = eval.score;
                self.best = self.assignments.clone();
                self.improved = true;
            }
            return;
        }

        let plan = self.plan;
        let index = plan.open[depth];
        let slot = &plan.slots[index];

        if self.can_beat_incumbent(self.unfilled) {
            let ranked: Vec<Assignee> = {
                let ctx = RankingContext::new(slot, &plan.context, &self.load, &self.nights);
                self.ranker
                    .rank(&plan.candidates[index], &ctx)
                    .into_iter()
                    .cloned()
                    .collect()
            };
            for candidate in ranked {
                let assignment = Assignment::for_slot(slot, candidate);
                if !self
                    .engine
                    .admits(&self.assignments, &assignment, self.rules, &plan.context)
                {
                    continue;
                }
                self.push(assignment);
                self.explore(depth + 1);
                self.pop();
                if self.stopped {
                    return;
                }
            }
        }

        if self.can_beat_incumbent(self.unfilled + 1) {
            self.unfilled += 1;
            self.explore(depth + 1);
            self.unfilled -= 1;
        }
    }

    fn push(&mut self, assignment: Assignment) {
        *self.load.entry(assignment.assignee.clone()).or_insert(0.0) +=
            self.tracker.delta_for_assignment(&assignment);
        if assignment.is_night() {
            *self.nights.entry(assignment.assignee.clone()).or_insert(0) += 1;
        }
        self.assignments.push(assignment);
    }

    fn pop(&mut self) {
        let Some(assignment) = self.assignments.pop() else {
            return;
        };
        if let Some(load) = self.load.get_mut(&assignment.assignee) {
            *load -= self.tracker.delta_for_assignment(&assignment);
        }
        if assignment.is_night() {
            if let Some(n) = self.nights.get_mut(&assignment.assignee) {
                *n = n.saturating_sub(1);
            }
        }
    }
}

impl SchedulingStrategy for ConstraintStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Constraint
    }

    fn generate(
        &self,
        problem: &ScheduleProblem,
        budget: &Budget,
    ) -> Result<StrategyOutcome, SchedulerError> {
        let plan = Plan::build(problem);
        let rules = &problem.rule_set;
        let tracker = FairnessTracker::new(self.weights.clone());

        let seed = construct(
            &plan,
            rules,
            &self.engine,
            &tracker,
            &self.ranker,
            &budget.without_iteration_cap(),
        );
        let seed_truncated = seed.truncated;
        let seed_score = self
            .engine
            .evaluate(&seed.assignments, rules, &plan.context)
            .score;

        let mut search = Search {
            plan: &plan,
            rules,
            engine: &self.engine,
            tracker: &tracker,
            ranker: &self.ranker,
            budget,
            node_limit: self.config.node_limit,
            gap_tolerance: self.config.gap_tolerance.max(0.0),
            assignments: plan.fixed.clone(),
            load: starting_load(&plan, &tracker),
            nights: night_counts(&plan.fixed),
            unfilled: 0,
            best: seed.assignments,
            best_score: seed_score,
            improved: false,
            nodes: 0,
            stopped: false,
        };
        search.explore(0);

        debug!(
            nodes = search.nodes,
            truncated = search.stopped || seed_truncated,
            improved = search.improved,
            score = search.best_score,
            "branch and bound finished"
        );
        let telemetry = RunTelemetry {
            iterations: search.nodes,
            truncated: search.stopped || seed_truncated,
            fallback: !search.improved,
            ..RunTelemetry::default()
        };
        Ok(StrategyOutcome::assemble(
            &plan,
            &self.engine,
            rules,
            search.best,
            telemetry,
            budget,
        ))
    }
}

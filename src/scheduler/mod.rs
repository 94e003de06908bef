//! Scheduling strategies and KPI evaluation.
//!
//! Every algorithm implements [`SchedulingStrategy`] and is looked up by
//! [`Algorithm`] in a [`StrategyRegistry`]. Strategies are pure functions
//! of a [`ScheduleProblem`] and a [`Budget`]; persistence and fairness
//! commits belong to the orchestrator.
//!
//! # Algorithms
//!
//! | Algorithm | Approach |
//! |-----------|----------|
//! | Greedy | Ranked first-fit over slots in fixed order |
//! | Constraint | Branch and bound seeded with the greedy incumbent |
//! | SimulatedAnnealing | Move/swap neighbourhood, Metropolis acceptance |
//! | Genetic | Per-slot genes, tournament selection, elitism |
//! | ScoreRank | Lowest running fairness score first |
//! | Manual | Evaluation of caller-supplied assignments |
//!
//! Every strategy except Manual keeps `manual_lock` assignments as fixed
//! givens and reports budget exhaustion through `telemetry.truncated`.
//!
//! # References
//!
//! - Ernst et al. (2004), "Staff scheduling and rostering: A review of
//!   applications, methods and models"
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"

mod annealing;
mod constraint;
mod genetic;
mod greedy;
mod kpi;
mod manual;
mod plan;
mod problem;
mod score_rank;

pub use annealing::AnnealingStrategy;
pub use constraint::ConstraintStrategy;
pub use genetic::GeneticStrategy;
pub use greedy::GreedyStrategy;
pub use kpi::RosterKpi;
pub use manual::ManualStrategy;
pub use plan::{expand_slots, Plan};
pub use problem::ScheduleProblem;
pub use score_rank::ScoreRankStrategy;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::models::{Algorithm, Assignment, RunTelemetry, Slot};
use crate::rules::{Evaluation, RuleEngine, RuleSet};

/// Limits on one strategy invocation.
///
/// Strategies call [`Budget::exhausted`] once per iteration (slot, node,
/// proposal or generation).
#[derive(Debug, Clone)]
pub struct Budget {
    started: Instant,
    deadline: Option<Instant>,
    max_iterations: Option<u64>,
    cancel: Arc<AtomicBool>,
    seed: u64,
}

impl Budget {
    /// Wall-clock budget starting now.
    pub fn new(time: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started.checked_add(time),
            max_iterations: None,
            cancel: Arc::new(AtomicBool::new(false)),
            seed: 42,
        }
    }

    /// No time or iteration limit.
    pub fn unlimited() -> Self {
        Self {
            started: Instant::now(),
            deadline: None,
            max_iterations: None,
            cancel: Arc::new(AtomicBool::new(false)),
            seed: 42,
        }
    }

    /// Caps iterations.
    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Shares a cancellation flag.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Seed for stochastic strategies.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Same deadline, cancellation flag and seed without the iteration cap.
    /// Used for the construction phase that seeds a search.
    pub fn without_iteration_cap(&self) -> Self {
        Self {
            max_iterations: None,
            ..self.clone()
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Whether the search must stop before iteration `iterations + 1`.
    pub fn exhausted(&self, iterations: u64) -> bool {
        self.is_cancelled()
            || self.max_iterations.is_some_and(|max| iterations >= max)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Milliseconds since the budget was created.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Result of one strategy invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOutcome {
    /// Full assignment set, including fixed locked assignments.
    pub assignments: Vec<Assignment>,
    pub evaluation: Evaluation,
    /// Demand slots left without an assignee.
    pub unfilled: Vec<Slot>,
    pub telemetry: RunTelemetry,
}

impl StrategyOutcome {
    /// Evaluates `assignments` against the plan and stamps the runtime.
    pub fn assemble(
        plan: &Plan,
        engine: &RuleEngine,
        rules: &RuleSet,
        assignments: Vec<Assignment>,
        mut telemetry: RunTelemetry,
        budget: &Budget,
    ) -> Self {
        let evaluation = engine.evaluate(&assignments, rules, &plan.context);
        let unfilled = plan.unfilled(&assignments);
        telemetry.runtime_ms = budget.elapsed_ms();
        Self {
            assignments,
            evaluation,
            unfilled,
            telemetry,
        }
    }

    /// Every slot filled without hard violations.
    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty() && self.evaluation.is_hard_feasible()
    }
}

/// A scheduling algorithm.
pub trait SchedulingStrategy: Send + Sync + Debug {
    /// Identifier used by the registry.
    fn algorithm(&self) -> Algorithm;

    /// Produces assignments for the problem within the budget.
    fn generate(
        &self,
        problem: &ScheduleProblem,
        budget: &Budget,
    ) -> Result<StrategyOutcome, SchedulerError>;
}

/// Strategies keyed by algorithm.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<Algorithm, Arc<dyn SchedulingStrategy>>,
}

impl StrategyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in strategy.
    pub fn with_defaults(config: &SchedulerConfig) -> Self {
        let engine = RuleEngine::new(config.rule_defaults.clone());
        Self::new()
            .with(GreedyStrategy::new(engine.clone(), config.fairness.clone()))
            .with(ConstraintStrategy::new(
                engine.clone(),
                config.fairness.clone(),
                config.constraint.clone(),
            ))
            .with(AnnealingStrategy::new(
                engine.clone(),
                config.fairness.clone(),
                config.annealing.clone(),
            ))
            .with(GeneticStrategy::new(
                engine.clone(),
                config.fairness.clone(),
                config.genetic.clone(),
            ))
            .with(ScoreRankStrategy::new(engine.clone(), config.fairness.clone()))
            .with(ManualStrategy::new(engine))
    }

    /// Adds (or replaces) a strategy.
    pub fn with<S: SchedulingStrategy + 'static>(mut self, strategy: S) -> Self {
        self.register(Arc::new(strategy));
        self
    }

    /// Adds (or replaces) a strategy.
    pub fn register(&mut self, strategy: Arc<dyn SchedulingStrategy>) {
        self.strategies.insert(strategy.algorithm(), strategy);
    }

    /// Looks up a strategy.
    pub fn get(&self, algorithm: Algorithm) -> Result<Arc<dyn SchedulingStrategy>, SchedulerError> {
        self.strategies
            .get(&algorithm)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownAlgorithm(algorithm.to_string()))
    }

    /// Registered algorithms in canonical order.
    pub fn algorithms(&self) -> Vec<Algorithm> {
        Algorithm::ALL
            .into_iter()
            .filter(|a| self.strategies.contains_key(a))
            .collect()
    }
}

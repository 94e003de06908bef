//! Simulated annealing over the roster encoding.
//!
//! # Algorithm
//!
//! 1. Seed with the greedy roster, encoded as one gene per open slot.
//! 2. Propose a neighbour: reroll one slot (new eligible assignee or
//!    unfilled) or swap the assignees of two slots.
//! 3. Decode with repair and score. Neighbours with more hard violations
//!    than the current roster are rejected outright.
//! 4. Accept improvements; accept a worse neighbour with probability
//!    `exp(delta / T)` (Metropolis). Keep the best roster seen.
//! 5. Cool geometrically, `T <- max(T * cooling_rate, min_temperature)`.
//!
//! Stops after the configured iterations or when the budget runs out
//! (`truncated`). Results are reproducible for a fixed budget seed.
//!
//! # Reference
//! Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated
//! Annealing"

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::greedy::construct;
use super::{Budget, Plan, ScheduleProblem, SchedulingStrategy, StrategyOutcome};
use crate::config::AnnealingConfig;
use crate::error::SchedulerError;
use crate::fairness::{FairnessTracker, FairnessWeights};
use crate::ga::operators::{CrossoverType, GeneticOperators, MutationType};
use crate::ga::RosterGaProblem;
use crate::models::{Algorithm, RunTelemetry};
use crate::ranking::Ranker;
use crate::rules::RuleEngine;

/// Simulated annealing strategy.
#[derive(Debug, Clone)]
pub struct AnnealingStrategy {
    engine: RuleEngine,
    weights: FairnessWeights,
    config: AnnealingConfig,
}

impl AnnealingStrategy {
    pub fn new(engine: RuleEngine, weights: FairnessWeights, config: AnnealingConfig) -> Self {
        Self {
            engine,
            weights,
            config,
        }
    }
}

impl SchedulingStrategy for AnnealingStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SimulatedAnnealing
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
            &Ranker::standard(),
            &budget.without_iteration_cap(),
        );

        let ga = RosterGaProblem::new(&plan, rules, &self.engine);
        let neighbourhood = GeneticOperators {
            crossover_type: CrossoverType::Uniform,
            mutation_type: MutationType::Mixed,
        };
        let mut rng = SmallRng::seed_from_u64(budget.seed());

        let mut current = ga.encode(&seed.assignments);
        let (mut current_assignments, current_eval) = ga.evaluate(&mut current);
        let mut current_hard = current_eval.violated_hard.len();
        let seed_fitness = current.fitness;
        let mut best = current.clone();
        let mut best_assignments = current_assignments.clone();

        let mut temperature = self.config.initial_temperature.max(self.config.min_temperature);
        let mut iterations = 0u64;
        let mut truncated = seed.truncated;

        if ga.gene_count() > 0 {
            while iterations < self.config.iterations {
                if budget.exhausted(iterations) {
                    truncated = true;
                    break;
                }
                iterations += 1;

                let mut neighbour = current.clone();
                neighbourhood.mutate(&mut neighbour, ga.space(), &mut rng);
                let (assignments, eval) = ga.evaluate(&mut neighbour);

                if eval.violated_hard.len() <= current_hard {
                    // Fitness is -score, so a positive delta is an improvement.
                    let delta = current.fitness - neighbour.fitness;
                    let accept = delta >= 0.0
                        || rng.random::<f64>() < (delta / temperature.max(f64::MIN_POSITIVE)).exp();
                    if accept {
                        current_hard = eval.violated_hard.len();
                        current = neighbour;
                        current_assignments = assignments;
                        if current.fitness < best.fitness - 1e-9 {
                            best = current.clone();
                            best_assignments = current_assignments.clone();
                        }
                    }
                }

                temperature = (temperature * self.config.cooling_rate).max(self.config.min_temperature);
            }
        }

        debug!(
            iterations,
            truncated,
            best_score = -best.fitness,
            seed_score = -seed_fitness,
            "annealing finished"
        );
        let telemetry = RunTelemetry {
            iterations,
            truncated,
            fallback: best.fitness >= seed_fitness - 1e-9,
            ..RunTelemetry::default()
        };
        Ok(StrategyOutcome::assemble(
            &plan,
            &self.engine,
            rules,
            best_assignments,
            telemetry,
            budget,
        ))
    }
}

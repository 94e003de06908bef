//! Genetic algorithm rostering.
//!
//! # Algorithm
//!
//! - Population: the greedy roster plus random chromosomes.
//! - Selection: tournament of `tournament_size`.
//! - Variation: configurable crossover at `crossover_rate`, configurable
//!   mutation at `mutation_rate` per child.
//! - Replacement: generational with `elitism` best carried over.
//! - Decoding repairs every child (see [`RosterGaProblem`]).
//!
//! One generation is one budget iteration. The best chromosome seen is
//! returned; `fallback` is set when it is no better than the greedy seed.

use std::cmp::Ordering;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::greedy::construct;
use super::{Budget, Plan, ScheduleProblem, SchedulingStrategy, StrategyOutcome};
use crate::config::GeneticConfig;
use crate::error::SchedulerError;
use crate::fairness::{FairnessTracker, FairnessWeights};
use crate::ga::operators::GeneticOperators;
use crate::ga::{RosterChromosome, RosterGaProblem};
use crate::models::{Algorithm, RunTelemetry};
use crate::ranking::Ranker;
use crate::rules::RuleEngine;

/// Genetic strategy.
#[derive(Debug, Clone)]
pub struct GeneticStrategy {
    engine: RuleEngine,
    weights: FairnessWeights,
    config: GeneticConfig,
    operators: GeneticOperators,
}

impl GeneticStrategy {
    pub fn new(engine: RuleEngine, weights: FairnessWeights, config: GeneticConfig) -> Self {
        Self {
            engine,
            weights,
            config,
            operators: GeneticOperators::default(),
        }
    }

    /// Replaces the crossover/mutation operators.
    pub fn with_operators(mut self, operators: GeneticOperators) -> Self {
        self.operators = operators;
        self
    }
}

fn by_fitness(a: &RosterChromosome, b: &RosterChromosome) -> Ordering {
    a.fitness.total_cmp(&b.fitness)
}

fn tournament<'p, R: Rng>(
    population: &'p [RosterChromosome],
    size: usize,
    rng: &mut R,
) -> &'p RosterChromosome {
    let mut winner = &population[rng.random_range(0..population.len())];
    for _ in 1..size.max(1) {
        let challenger = &population[rng.random_range(0..population.len())];
        if challenger.fitness < winner.fitness {
            winner = challenger;
        }
    }
    winner
}

impl SchedulingStrategy for GeneticStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Genetic
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
        let mut rng = SmallRng::seed_from_u64(budget.seed());
        let population_size = self.config.population_size.max(2);
        let elitism = self.config.elitism.min(population_size);

        let mut seed_chromosome = ga.encode(&seed.assignments);
        ga.evaluate(&mut seed_chromosome);
        let seed_fitness = seed_chromosome.fitness;

        let mut population = Vec::with_capacity(population_size);
        population.push(seed_chromosome);
        while population.len() < population_size {
            let mut individual = ga.random(&mut rng);
            ga.evaluate(&mut individual);
            population.push(individual);
        }
        population.sort_by(by_fitness);

        let mut generations = 0u64;
        let mut truncated = seed.truncated;

        if ga.gene_count() > 0 {
            while generations < self.config.generations {
                if budget.exhausted(generations) {
                    truncated = true;
                    break;
                }
                generations += 1;

                let mut next: Vec<RosterChromosome> =
                    population.iter().take(elitism).cloned().collect();
                while next.len() < population_size {
                    let p1 = tournament(&population, self.config.tournament_size, &mut rng);
                    let p2 = tournament(&population, self.config.tournament_size, &mut rng);
                    let (mut c1, mut c2) = if rng.random_bool(self.config.crossover_rate.clamp(0.0, 1.0)) {
                        self.operators.crossover(p1, p2, &mut rng)
                    } else {
                        (p1.clone(), p2.clone())
                    };
                    for child in [&mut c1, &mut c2] {
                        if rng.random_bool(self.config.mutation_rate.clamp(0.0, 1.0)) {
                            self.operators.mutate(child, ga.space(), &mut rng);
                        }
                        ga.evaluate(child);
                    }
                    next.push(c1);
                    if next.len() < population_size {
                        next.push(c2);
                    }
                }
                next.sort_by(by_fitness);
                population = next;
            }
        }

        let mut best = population
            .into_iter()
            .min_by(by_fitness)
            .unwrap_or_else(|| RosterChromosome::from_genes(Vec::new()));
        let assignments = ga.decode(&mut best);

        debug!(
            generations,
            truncated,
            best_score = -best.fitness,
            seed_score = -seed_fitness,
            "genetic search finished"
        );
        let telemetry = RunTelemetry {
            iterations: generations,
            truncated,
            fallback: best.fitness >= seed_fitness - 1e-9,
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
    use crate::ga::operators::{CrossoverType, MutationType};
    use crate::models::{Assignee, DemandRequirement, Employee, ShiftCategory, ShiftTemplate};
    use crate::rules::{Rule, RuleKind, RuleSet};
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn strategy(generations: u64) -> GeneticStrategy {
        GeneticStrategy::new(
            RuleEngine::default(),
            FairnessWeights::default(),
            GeneticConfig {
                generations,
                population_size: 20,
                ..GeneticConfig::default()
            },
        )
    }

    fn trap() -> ScheduleProblem {
        ScheduleProblem::new("t1", d(3), d(3), RuleSet::new("rs", "t1"))
            .with_employee(Employee::new("a").with_role("nurse"))
            .with_employee(Employee::new("b"))
            .with_template(ShiftTemplate::new("day", t(8), t(16), ShiftCategory::Day).with_priority(1))
            .with_template(ShiftTemplate::new("late", t(12), t(20), ShiftCategory::Evening))
            .with_demand(vec![
                DemandRequirement::new("day", Weekday::Mon, 1),
                DemandRequirement::new("late", Weekday::Mon, 1).with_role("nurse"),
            ])
    }

    #[test]
    fn test_finds_complete_roster() {
        let outcome = strategy(50).generate(&trap(), &Budget::unlimited()).unwrap();
        assert!(outcome.is_complete());
        let late = outcome.assignments.iter().find(|a| a.template_id == "late").unwrap();
        assert_eq!(late.assignee, Assignee::Employee("a".into()));
    }

    #[test]
    fn test_elitism_keeps_seed_quality() {
        let rules = RuleSet::new("rs", "t1")
            .with_rule(Rule::hard("nights", RuleKind::MaxNightShiftsPerWeek { max: 2 }));
        let problem = ScheduleProblem::new("t1", d(3), d(9), rules)
            .with_employees(["a", "b", "c"].map(Employee::new))
            .with_template(ShiftTemplate::new("night", t(22), t(6), ShiftCategory::Night))
            .with_demand(DemandRequirement::every_day("night", 1));
        let outcome = strategy(10)
            .with_operators(GeneticOperators {
                crossover_type: CrossoverType::TwoPoint,
                mutation_type: MutationType::Swap,
            })
            .generate(&problem, &Budget::unlimited())
            .unwrap();
        assert!(outcome.evaluation.is_hard_feasible());
        assert_eq!(outcome.assignments.len(), 6);
    }

    #[test]
    fn test_generation_cap_truncates() {
        let budget = Budget::unlimited().with_max_iterations(3);
        let outcome = strategy(100).generate(&trap(), &budget).unwrap();
        assert!(outcome.telemetry.truncated);
        assert_eq!(outcome.telemetry.iterations, 3);
    }

    #[test]
    fn test_tournament_prefers_fitter() {
        let population = vec![
            RosterChromosome {
                genes: vec![Some(0)],
                fitness: 10.0,
            },
            RosterChromosome {
                genes: vec![Some(1)],
                fitness: 1.0,
            },
        ];
        let mut rng = SmallRng::seed_from_u64(5);
        let mut wins = 0;
        for _ in 0..100 {
            if tournament(&population, 3, &mut rng).fitness == 1.0 {
                wins += 1;
            }
        }
        assert!(wins > 50);
    }
}

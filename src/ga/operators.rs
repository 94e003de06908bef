//! Configurable genetic operators for rostering.
//!
//! Provides runtime-selectable crossover and mutation strategies
//! via [`GeneticOperators`].
//!
//! # Usage
//!
//! ```
//! use u_roster::ga::operators::{GeneticOperators, CrossoverType, MutationType};
//!
//! let ops = GeneticOperators::default();
//! assert_eq!(ops.crossover_type, CrossoverType::Uniform);
//! assert_eq!(ops.mutation_type, MutationType::Reroll);
//! ```

use rand::Rng;

use super::chromosome::{
    one_point_crossover, reroll_mutation, swap_mutation, two_point_crossover, uniform_crossover,
    GeneSpace, RosterChromosome,
};

/// Crossover strategy for roster chromosomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossoverType {
    /// Swap tails after one cut.
    OnePoint,
    /// Swap the segment between two cuts.
    TwoPoint,
    /// Per-gene coin flip.
    Uniform,
}

/// Mutation strategy for roster chromosomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    /// Redraw one gene (possibly clearing it).
    Reroll,
    /// Exchange assignees between two slots.
    Swap,
    /// Reroll or swap with equal odds.
    Mixed,
}

/// Runtime-selectable genetic operators for the roster GA.
#[derive(Debug, Clone)]
pub struct GeneticOperators {
    /// Crossover strategy.
    pub crossover_type: CrossoverType,
    /// Mutation strategy.
    pub mutation_type: MutationType,
}

impl Default for GeneticOperators {
    fn default() -> Self {
        Self {
            crossover_type: CrossoverType::Uniform,
            mutation_type: MutationType::Reroll,
        }
    }
}

impl GeneticOperators {
    /// Performs crossover using the configured strategy.
    pub fn crossover<R: Rng>(
        &self,
        p1: &RosterChromosome,
        p2: &RosterChromosome,
        rng: &mut R,
    ) -> (RosterChromosome, RosterChromosome) {
        match self.crossover_type {
            CrossoverType::OnePoint => one_point_crossover(p1, p2, rng),
            CrossoverType::TwoPoint => two_point_crossover(p1, p2, rng),
            CrossoverType::Uniform => uniform_crossover(p1, p2, rng),
        }
    }

    /// Performs mutation using the configured strategy.
    pub fn mutate<R: Rng>(&self, chromosome: &mut RosterChromosome, space: &GeneSpace, rng: &mut R) {
        match self.mutation_type {
            MutationType::Reroll => reroll_mutation(chromosome, space, rng),
            MutationType::Swap => swap_mutation(chromosome, space, rng),
            MutationType::Mixed => {
                if rng.random_bool(0.5) {
                    reroll_mutation(chromosome, space, rng)
                } else {
                    swap_mutation(chromosome, space, rng)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn sample_space() -> Vec<Vec<usize>> {
        vec![vec![0, 1], vec![0, 1], vec![1, 2]]
    }

    #[test]
    fn test_default_operators() {
        let ops = GeneticOperators::default();
        assert_eq!(ops.crossover_type, CrossoverType::Uniform);
        assert_eq!(ops.mutation_type, MutationType::Reroll);
    }

    #[test]
    fn test_every_crossover_preserves_length() {
        let space = sample_space();
        let mut rng = SmallRng::seed_from_u64(42);
        let p1 = RosterChromosome::random(&space, &mut rng);
        let p2 = RosterChromosome::random(&space, &mut rng);
        for crossover_type in [CrossoverType::OnePoint, CrossoverType::TwoPoint, CrossoverType::Uniform] {
            let ops = GeneticOperators {
                crossover_type,
                mutation_type: MutationType::Reroll,
            };
            let (c1, c2) = ops.crossover(&p1, &p2, &mut rng);
            assert_eq!(c1.genes.len(), 3);
            assert_eq!(c2.genes.len(), 3);
        }
    }

    #[test]
    fn test_mixed_mutation_changes_something() {
        let space = sample_space();
        let ops = GeneticOperators {
            crossover_type: CrossoverType::Uniform,
            mutation_type: MutationType::Mixed,
        };
        let mut rng = SmallRng::seed_from_u64(42);
        let original = RosterChromosome::random(&space, &mut rng);
        let mut changed = false;
        for _ in 0..50 {
            let mut ch = original.clone();
            ops.mutate(&mut ch, &space, &mut rng);
            assert!(ch.is_valid(&space));
            if ch.genes != original.genes {
                changed = true;
            }
        }
        assert!(changed);
    }
}

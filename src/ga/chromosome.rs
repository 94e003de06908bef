//! Per-slot assignee chromosome for rostering.
//!
//! # Encoding
//!
//! One gene per open slot, in plan order. A gene holds the pool index of
//! the assignee for that slot, or `None` when the slot is left unfilled.
//! The gene space lists, per gene, the pool indices eligible for the
//! slot.
//!
//! # Reference
//! Aickelin & Dowsland (2004), "An indirect Genetic Algorithm for a
//! nurse-scheduling problem"

use rand::prelude::IndexedRandom;
use rand::Rng;

/// Allowed pool indices per gene.
pub type GeneSpace = [Vec<usize>];

/// Roster chromosome.
///
/// Lower fitness = better roster (minimization convention).
#[derive(Debug, Clone, PartialEq)]
pub struct RosterChromosome {
    /// Pool index per open slot.
    pub genes: Vec<Option<usize>>,
    /// Fitness value (lower = better).
    pub fitness: f64,
}

impl RosterChromosome {
    /// Wraps a gene vector with unset fitness.
    pub fn from_genes(genes: Vec<Option<usize>>) -> Self {
        Self {
            genes,
            fitness: f64::INFINITY,
        }
    }

    /// Random chromosome: every gene draws from its allowed set.
    pub fn random<R: Rng>(space: &GeneSpace, rng: &mut R) -> Self {
        let genes = space.iter().map(|allowed| allowed.choose(rng).copied()).collect();
        Self::from_genes(genes)
    }

    /// Genes holding an assignee.
    pub fn filled(&self) -> usize {
        self.genes.iter().filter(|g| g.is_some()).count()
    }

    /// Whether every gene is unset or drawn from its allowed set.
    pub fn is_valid(&self, space: &GeneSpace) -> bool {
        self.genes.len() == space.len()
            && self
                .genes
                .iter()
                .zip(space)
                .all(|(g, allowed)| g.map_or(true, |p| allowed.contains(&p)))
    }

    fn reset_fitness(mut self) -> Self {
        self.fitness = f64::INFINITY;
        self
    }
}

// ======================== Crossover operators ========================

/// One-point crossover: children swap tails after a random cut.
pub fn one_point_crossover<R: Rng>(
    p1: &RosterChromosome,
    p2: &RosterChromosome,
    rng: &mut R,
) -> (RosterChromosome, RosterChromosome) {
    let len = p1.genes.len().min(p2.genes.len());
    if len < 2 {
        return (p1.clone().reset_fitness(), p2.clone().reset_fitness());
    }
    let cut = rng.random_range(1..len);
    exchange(p1, p2, |i| i >= cut)
}

/// Two-point crossover: children swap the segment between two cuts.
pub fn two_point_crossover<R: Rng>(
    p1: &RosterChromosome,
    p2: &RosterChromosome,
    rng: &mut R,
) -> (RosterChromosome, RosterChromosome) {
    let len = p1.genes.len().min(p2.genes.len());
    if len < 2 {
        return (p1.clone().reset_fitness(), p2.clone().reset_fitness());
    }
    let mut a = rng.random_range(0..len);
    let mut b = rng.random_range(0..len);
    if a > b {
        std::mem::swap(&mut a, &mut b);
    }
    exchange(p1, p2, |i| i >= a && i <= b)
}

/// Uniform crossover: each gene comes from either parent with equal odds.
pub fn uniform_crossover<R: Rng>(
    p1: &RosterChromosome,
    p2: &RosterChromosome,
    rng: &mut R,
) -> (RosterChromosome, RosterChromosome) {
    let len = p1.genes.len().min(p2.genes.len());
    let mask: Vec<bool> = (0..len).map(|_| rng.random_bool(0.5)).collect();
    exchange(p1, p2, |i| mask[i])
}

fn exchange(
    p1: &RosterChromosome,
    p2: &RosterChromosome,
    swap_at: impl Fn(usize) -> bool,
) -> (RosterChromosome, RosterChromosome) {
    let mut c1 = p1.clone().reset_fitness();
    let mut c2 = p2.clone().reset_fitness();
    let len = c1.genes.len().min(c2.genes.len());
    for i in (0..len).filter(|&i| swap_at(i)) {
        std::mem::swap(&mut c1.genes[i], &mut c2.genes[i]);
    }
    (c1, c2)
}

// ======================== Mutation operators ========================

/// Reroll mutation: redraws one gene from its allowed set, or clears it
/// with probability `1 / (allowed + 1)`.
pub fn reroll_mutation<R: Rng>(chromosome: &mut RosterChromosome, space: &GeneSpace, rng: &mut R) {
    let len = chromosome.genes.len().min(space.len());
    if len == 0 {
        return;
    }
    let idx = rng.random_range(0..len);
    let allowed = &space[idx];
    let pick = rng.random_range(0..=allowed.len());
    chromosome.genes[idx] = allowed.get(pick).copied();
}

/// Swap mutation: exchanges the assignees of two genes when each is
/// allowed at the other's position.
pub fn swap_mutation<R: Rng>(chromosome: &mut RosterChromosome, space: &GeneSpace, rng: &mut R) {
    let len = chromosome.genes.len().min(space.len());
    if len < 2 {
        return;
    }
    let i = rng.random_range(0..len);
    let j = rng.random_range(0..len);
    let (gi, gj) = (chromosome.genes[i], chromosome.genes[j]);
    let fits = |gene: Option<usize>, at: usize| gene.map_or(true, |p| space[at].contains(&p));
    if i != j && fits(gi, j) && fits(gj, i) {
        chromosome.genes.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn sample_space() -> Vec<Vec<usize>> {
        vec![vec![0, 1], vec![1], vec![0, 2], vec![]]
    }

    #[test]
    fn test_random_chromosome() {
        let space = sample_space();
        let mut rng = SmallRng::seed_from_u64(42);
        let ch = RosterChromosome::random(&space, &mut rng);

        assert_eq!(ch.genes.len(), 4);
        assert!(ch.is_valid(&space));
        assert_eq!(ch.genes[1], Some(1));
        assert_eq!(ch.genes[3], None);
        assert_eq!(ch.filled(), 3);
        assert_eq!(ch.fitness, f64::INFINITY);
    }

    #[test]
    fn test_crossovers_keep_validity() {
        let space = sample_space();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..20 {
            let p1 = RosterChromosome::random(&space, &mut rng);
            let p2 = RosterChromosome::random(&space, &mut rng);
            for (c1, c2) in [
                one_point_crossover(&p1, &p2, &mut rng),
                two_point_crossover(&p1, &p2, &mut rng),
                uniform_crossover(&p1, &p2, &mut rng),
            ] {
                assert!(c1.is_valid(&space));
                assert!(c2.is_valid(&space));
                assert_eq!(c1.fitness, f64::INFINITY);
            }
        }
    }

    #[test]
    fn test_one_point_exchanges_tail() {
        let p1 = RosterChromosome::from_genes(vec![Some(0), Some(0), Some(0)]);
        let p2 = RosterChromosome::from_genes(vec![Some(1), Some(1), Some(1)]);
        let mut rng = SmallRng::seed_from_u64(1);
        let (c1, c2) = one_point_crossover(&p1, &p2, &mut rng);
        assert_eq!(c1.genes[0], Some(0));
        assert_eq!(c2.genes[0], Some(1));
        assert_eq!(c1.genes[2], Some(1));
        assert_eq!(c2.genes[2], Some(0));
    }

    #[test]
    fn test_mutations_keep_validity() {
        let space = sample_space();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut ch = RosterChromosome::random(&space, &mut rng);
        for _ in 0..100 {
            reroll_mutation(&mut ch, &space, &mut rng);
            swap_mutation(&mut ch, &space, &mut rng);
            assert!(ch.is_valid(&space));
        }
    }

    #[test]
    fn test_reroll_can_clear() {
        let space = vec![vec![0]];
        let mut rng = SmallRng::seed_from_u64(3);
        let mut cleared = false;
        for _ in 0..50 {
            let mut ch = RosterChromosome::from_genes(vec![Some(0)]);
            reroll_mutation(&mut ch, &space, &mut rng);
            if ch.genes[0].is_none() {
                cleared = true;
                break;
            }
        }
        assert!(cleared);
    }

    #[test]
    fn test_invalid_chromosome() {
        let space = sample_space();
        let ch = RosterChromosome::from_genes(vec![Some(2), None, None, None]);
        assert!(!ch.is_valid(&space));
        let short = RosterChromosome::from_genes(vec![None]);
        assert!(!short.is_valid(&space));
    }
}

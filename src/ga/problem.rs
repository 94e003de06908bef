//! Roster GA problem definition.
//!
//! Bridges a [`Plan`] to the chromosome encoding: builds the gene space,
//! encodes existing assignments, and decodes chromosomes into assignment
//! sets that the rule engine scores.
//!
//! # Decoding
//! Genes are decoded in plan order. A gene whose assignee the rule engine
//! does not admit (it would add a hard violation) is cleared, so decoded
//! chromosomes are repaired in place and never double-book anyone.

use std::collections::HashMap;

use rand::Rng;

use super::chromosome::RosterChromosome;
use crate::models::{Assignee, Assignment};
use crate::rules::{Evaluation, RuleEngine, RuleSet};
use crate::scheduler::Plan;

/// GA view of a planning problem.
pub struct RosterGaProblem<'a> {
    plan: &'a Plan,
    rules: &'a RuleSet,
    engine: &'a RuleEngine,
    pool: Vec<Assignee>,
    space: Vec<Vec<usize>>,
}

impl<'a> RosterGaProblem<'a> {
    /// Builds the gene space from the plan's open slots.
    pub fn new(plan: &'a Plan, rules: &'a RuleSet, engine: &'a RuleEngine) -> Self {
        let pool: Vec<Assignee> = plan.context.pool().to_vec();
        let position: HashMap<&Assignee, usize> =
            pool.iter().enumerate().map(|(i, a)| (a, i)).collect();
        let space = plan
            .open
            .iter()
            .map(|&slot| {
                plan.candidates[slot]
                    .iter()
                    .filter_map(|c| position.get(c).copied())
                    .collect()
            })
            .collect();
        Self {
            plan,
            rules,
            engine,
            pool,
            space,
        }
    }

    /// Allowed pool indices per gene.
    pub fn space(&self) -> &[Vec<usize>] {
        &self.space
    }

    /// Number of genes (open slots).
    pub fn gene_count(&self) -> usize {
        self.space.len()
    }

    /// Random chromosome over the gene space.
    pub fn random<R: Rng>(&self, rng: &mut R) -> RosterChromosome {
        RosterChromosome::random(&self.space, rng)
    }

    /// Encodes an assignment set; open slots without an assignment, or
    /// with an assignee outside the gene space, become `None`.
    pub fn encode(&self, assignments: &[Assignment]) -> RosterChromosome {
        let by_slot: HashMap<&str, &Assignee> = assignments
            .iter()
            .map(|a| (a.slot_id.as_str(), &a.assignee))
            .collect();
        let genes = self
            .plan
            .open
            .iter()
            .zip(&self.space)
            .map(|(&slot, allowed)| {
                let assignee = by_slot.get(self.plan.slots[slot].id.as_str())?;
                let p = self.pool.iter().position(|a| a == *assignee)?;
                allowed.contains(&p).then_some(p)
            })
            .collect();
        RosterChromosome::from_genes(genes)
    }

    /// Decodes (and repairs) a chromosome into fixed plus open assignments.
    pub fn decode(&self, chromosome: &mut RosterChromosome) -> Vec<Assignment> {
        let mut assignments = self.plan.fixed.clone();
        for (gene, &slot) in chromosome.genes.iter_mut().zip(&self.plan.open) {
            let Some(p) = *gene else {
                continue;
            };
            let Some(assignee) = self.pool.get(p) else {
                *gene = None;
                continue;
            };
            let candidate = Assignment::for_slot(&self.plan.slots[slot], assignee.clone());
            if self
                .engine
                .admits(&assignments, &candidate, self.rules, &self.plan.context)
            {
                assignments.push(candidate);
            } else {
                *gene = None;
            }
        }
        assignments
    }

    /// Decodes, scores and stores fitness (`-score`).
    pub fn evaluate(&self, chromosome: &mut RosterChromosome) -> (Vec<Assignment>, Evaluation) {
        let assignments = self.decode(chromosome);
        let evaluation = self
            .engine
            .evaluate(&assignments, self.rules, &self.plan.context);
        chromosome.fitness = -evaluation.score;
        (assignments, evaluation)
    }
}

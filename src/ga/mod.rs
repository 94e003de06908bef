//! GA-based roster optimization.
//!
//! Roster-specific GA encodings used by the genetic and annealing
//! strategies.
//!
//! # Encoding
//!
//! One gene per open slot holding an optional pool index. Decoding walks
//! the genes in plan order and drops any the rule engine does not admit,
//! so every decoded roster is free of new hard violations.
//!
//! # Submodules
//!
//! - [`operators`]: Runtime-selectable crossover and mutation strategies
//!
//! # Reference
//! - Aickelin & Dowsland (2004), "An indirect Genetic Algorithm for a
//!   nurse-scheduling problem"
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"

mod chromosome;
pub mod operators;
mod problem;

pub use chromosome::{
    one_point_crossover, reroll_mutation, swap_mutation, two_point_crossover, uniform_crossover,
    GeneSpace, RosterChromosome,
};
pub use problem::RosterGaProblem;

//! Genetic search over block/machine assignments.
//!
//! # Encoding
//!
//! A chromosome is a permutation of all catalog tasks. The block structure
//! is *derived*: every sequence edit is followed by a deterministic
//! rebuild through the block partitioner, and the per-block machine
//! assignment is reconciled to the new block count. This keeps the
//! capacity and fixture constraints satisfied by construction instead of
//! penalizing them.
//!
//! # Submodules
//!
//! - [`individual`]: chromosome representation and evaluation
//! - [`operators`]: selection, crossover, mutation, replacement

pub mod individual;
pub mod operators;

pub use individual::{repair_precedence, Individual};
pub use operators::{
    elitist_replacement, mutate, order_crossover, tournament_select, TOURNAMENT_SIZE,
};

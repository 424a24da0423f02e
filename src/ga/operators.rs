//! Genetic operators.
//!
//! Tournament selection, order crossover (OX), three mutation variants,
//! and elitist replacement. Operators never mutate a selected parent in
//! place: selection copies, crossover builds new children, mutation runs
//! on offspring already owned by the generation loop.
//!
//! # Reference
//! - Davis (1985), order crossover for permutation chromosomes
//! - Goldberg & Deb (1991), tournament selection

use rand::seq::{index, IndexedRandom};
use rand::Rng;
use std::collections::HashSet;

use crate::catalog::{Catalog, TaskRef};

use super::individual::{repair_precedence, Individual};

/// Tournament size for selection.
pub const TOURNAMENT_SIZE: usize = 3;

/// Selects `count` parents by k-way tournament with replacement across
/// picks. Each pick samples `TOURNAMENT_SIZE` distinct members and copies
/// the fitness-minimal one.
pub fn tournament_select<R: Rng>(
    population: &[Individual],
    count: usize,
    rng: &mut R,
) -> Vec<Individual> {
    let k = TOURNAMENT_SIZE.min(population.len());
    (0..count)
        .map(|_| {
            let entrants = index::sample(rng, population.len(), k);
            let winner = entrants
                .iter()
                .min_by(|&a, &b| population[a].fitness.total_cmp(&population[b].fitness))
                .expect("non-empty tournament");
            population[winner].clone()
        })
        .collect()
}

/// Order crossover (OX) over the task sequences of two parents.
///
/// Two distinct cut indices are drawn; child A keeps parent A's
/// sub-sequence at the same positions and fills the remaining slots left
/// to right with parent B's tasks in parent B's relative order. Child B is
/// symmetric. Children get blocks rebuilt from their own sequence and a
/// fresh uniform-random machine per block — parental machine assignments
/// are deliberately not inherited.
pub fn order_crossover<R: Rng>(
    catalog: &Catalog,
    parent_a: &Individual,
    parent_b: &Individual,
    tool_capacity: usize,
    machine_count: usize,
    rng: &mut R,
) -> (Individual, Individual) {
    let size = parent_a.sequence.len();
    if size < 2 {
        return (parent_a.clone(), parent_b.clone());
    }

    let cuts = index::sample(rng, size, 2);
    let (lo, hi) = (
        cuts.index(0).min(cuts.index(1)),
        cuts.index(0).max(cuts.index(1)),
    );

    let child_a = ox_child(&parent_a.sequence, &parent_b.sequence, lo, hi);
    let child_b = ox_child(&parent_b.sequence, &parent_a.sequence, lo, hi);

    (
        Individual::from_sequence(catalog, child_a, tool_capacity, machine_count, rng),
        Individual::from_sequence(catalog, child_b, tool_capacity, machine_count, rng),
    )
}

/// Builds one OX child: `template[lo..hi]` kept in place, gaps filled
/// from `donor` in donor order, then OP1→OP2 repair.
fn ox_child(template: &[TaskRef], donor: &[TaskRef], lo: usize, hi: usize) -> Vec<TaskRef> {
    let kept: HashSet<TaskRef> = template[lo..hi].iter().copied().collect();
    let mut fill = donor.iter().filter(|t| !kept.contains(t));

    let mut child = Vec::with_capacity(template.len());
    for (idx, &task) in template.iter().enumerate() {
        if idx >= lo && idx < hi {
            child.push(task);
        } else {
            child.push(*fill.next().expect("donor covers remaining slots"));
        }
    }
    repair_precedence(&mut child);
    child
}

/// Mutation variants, chosen uniformly per application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationKind {
    /// Swap two sequence positions.
    Swap,
    /// Reassign one block's machine.
    Machine,
    /// Remove one task and reinsert it elsewhere.
    Insert,
}

/// Mutates an individual in place with one uniformly chosen variant.
/// Sequence edits rebuild the block structure and reconcile the machine
/// assignment length.
pub fn mutate<R: Rng>(
    catalog: &Catalog,
    individual: &mut Individual,
    tool_capacity: usize,
    machine_count: usize,
    rng: &mut R,
) {
    let kind = *[MutationKind::Swap, MutationKind::Machine, MutationKind::Insert]
        .choose(rng)
        .expect("non-empty variant list");

    match kind {
        MutationKind::Swap => {
            let len = individual.sequence.len();
            if len < 2 {
                return;
            }
            let picks = index::sample(rng, len, 2);
            individual.sequence.swap(picks.index(0), picks.index(1));
            repair_precedence(&mut individual.sequence);
            individual.rebuild_blocks(catalog, tool_capacity, machine_count, rng);
        }
        MutationKind::Machine => {
            if individual.machine_assignment.is_empty() {
                return;
            }
            let block = rng.random_range(0..individual.machine_assignment.len());
            individual.machine_assignment[block] = rng.random_range(0..machine_count);
        }
        MutationKind::Insert => {
            let len = individual.sequence.len();
            if len < 2 {
                return;
            }
            let from = rng.random_range(0..len);
            let to = rng.random_range(0..len);
            let task = individual.sequence.remove(from);
            individual.sequence.insert(to, task);
            repair_precedence(&mut individual.sequence);
            individual.rebuild_blocks(catalog, tool_capacity, machine_count, rng);
        }
    }
}

/// Elitist replacement: keep the `size` fitness-best of parents ∪
/// offspring. The best fitness present in the merged pool always
/// survives.
pub fn elitist_replacement(
    mut population: Vec<Individual>,
    offspring: Vec<Individual>,
    size: usize,
) -> Vec<Individual> {
    population.extend(offspring);
    population.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
    population.truncate(size);
    population
}

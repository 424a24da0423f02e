//! Candidate solution representation.
//!
//! An individual is a permutation of all catalog tasks plus the block
//! structure derived from it and one machine index per block. Blocks are
//! never patched in place: any sequence edit goes through a full rebuild,
//! followed by machine-assignment reconciliation (extend with random
//! assignments if the block count grew, truncate if it shrank).

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::blocks::{build_blocks, Block};
use crate::catalog::{Catalog, OpCode, TaskRef};
use crate::sim::{simulate, Objective};

/// One candidate schedule in the genetic search.
///
/// Fitness fields are caches filled by [`evaluate`](Individual::evaluate);
/// a freshly built individual carries `f64::INFINITY` until evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    /// Task sequence (permutation of the full catalog).
    pub sequence: Vec<TaskRef>,
    /// Block structure derived from `sequence`.
    pub blocks: Vec<Block>,
    /// Machine index per block.
    pub machine_assignment: Vec<usize>,
    /// Scalar fitness (lower = better).
    pub fitness: f64,
    /// Cached makespan of the last evaluation (minutes).
    pub makespan: f64,
    /// Cached total lateness of the last evaluation (minutes).
    pub total_delay: f64,
    /// Cached machine load variance of the last evaluation.
    pub load_variance: f64,
}

impl Individual {
    /// Creates a random individual: shuffled task permutation (repaired
    /// for OP1→OP2 order), derived blocks, uniform random machine per
    /// block.
    pub fn random<R: Rng>(
        catalog: &Catalog,
        tool_capacity: usize,
        machine_count: usize,
        rng: &mut R,
    ) -> Self {
        let mut sequence = catalog.tasks.clone();
        sequence.shuffle(rng);
        repair_precedence(&mut sequence);
        Self::from_sequence(catalog, sequence, tool_capacity, machine_count, rng)
    }

    /// Builds an individual from a given sequence with fresh random
    /// machine assignments.
    pub fn from_sequence<R: Rng>(
        catalog: &Catalog,
        sequence: Vec<TaskRef>,
        tool_capacity: usize,
        machine_count: usize,
        rng: &mut R,
    ) -> Self {
        let blocks = build_blocks(catalog, &sequence, tool_capacity);
        let machine_assignment = (0..blocks.len())
            .map(|_| rng.random_range(0..machine_count))
            .collect();
        Self {
            sequence,
            blocks,
            machine_assignment,
            fitness: f64::INFINITY,
            makespan: 0.0,
            total_delay: 0.0,
            load_variance: 0.0,
        }
    }

    /// Rebuilds blocks from the current sequence and reconciles the
    /// machine assignment length. Must be called after any sequence edit.
    pub fn rebuild_blocks<R: Rng>(
        &mut self,
        catalog: &Catalog,
        tool_capacity: usize,
        machine_count: usize,
        rng: &mut R,
    ) {
        self.blocks = build_blocks(catalog, &self.sequence, tool_capacity);
        let needed = self.blocks.len();
        if self.machine_assignment.len() < needed {
            while self.machine_assignment.len() < needed {
                self.machine_assignment.push(rng.random_range(0..machine_count));
            }
        } else {
            self.machine_assignment.truncate(needed);
        }
    }

    /// Evaluates fitness via the simulator and fills the cached metrics.
    ///
    /// A simulation failure is local to this individual: it keeps a
    /// sentinel infinite fitness instead of propagating the error.
    pub fn evaluate(
        &mut self,
        catalog: &Catalog,
        machine_count: usize,
        setup_time_min: f64,
        objective: Objective,
    ) {
        match simulate(
            catalog,
            &self.blocks,
            &self.machine_assignment,
            machine_count,
            setup_time_min,
        ) {
            Ok(outcome) => {
                self.fitness = outcome.scalar_fitness(objective);
                self.makespan = outcome.makespan;
                self.total_delay = outcome.total_delay;
                self.load_variance = outcome.load_variance;
            }
            Err(err) => {
                debug!(%err, "simulation failed, penalizing individual");
                self.fitness = f64::INFINITY;
                self.makespan = 0.0;
                self.total_delay = 0.0;
                self.load_variance = 0.0;
            }
        }
    }

    /// Number of over-capacity singleton blocks in this individual.
    pub fn over_capacity_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.over_capacity).count()
    }
}

/// Restores OP1-before-OP2 order for every (order, unit) pair.
///
/// Each pair occupies exactly two fixed positions in the permutation;
/// swapping them when reversed fixes the pair without moving any other
/// task, so the result is still a permutation of the same multiset.
pub fn repair_precedence(sequence: &mut [TaskRef]) {
    let mut op1_pos: HashMap<(usize, u32), usize> = HashMap::new();
    let mut op2_pos: HashMap<(usize, u32), usize> = HashMap::new();

    for (idx, task) in sequence.iter().enumerate() {
        match task.op {
            OpCode::Op1 => {
                op1_pos.insert((task.order, task.unit), idx);
            }
            OpCode::Op2 => {
                op2_pos.insert((task.order, task.unit), idx);
            }
        }
    }

    for (key, &p2) in &op2_pos {
        if let Some(&p1) = op1_pos.get(key) {
            if p2 < p1 {
                sequence.swap(p1, p2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManufacturingOrder, Operation, PalletType, PieceType};
    use chrono::NaiveDate;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn epoch() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn sample_catalog() -> Catalog {
        let two_op = PieceType::new(
            "PIECE_A",
            Operation::new("OP10", 15.0).with_tools(["t1", "t2"]),
            PalletType::Small,
        )
        .with_op2(Operation::new("OP20", 25.0).with_tool("t3"))
        .with_fixture("F1");
        let single_op = PieceType::new(
            "PIECE_C",
            Operation::new("OP20", 10.0).with_tools(["t4", "t5"]),
            PalletType::Big,
        )
        .with_fixture("F2");

        Catalog::build(
            &[
                ManufacturingOrder::new("O1", 3, two_op)
                    .with_load_delay(5.0)
                    .with_rotation_delay(2.0),
                ManufacturingOrder::new("O2", 4, single_op),
            ],
            epoch(),
        )
    }

    #[test]
    fn test_random_individual_is_valid_permutation() {
        let catalog = sample_catalog();
        let mut rng = SmallRng::seed_from_u64(42);
        let ind = Individual::random(&catalog, 40, 2, &mut rng);

        assert_eq!(ind.sequence.len(), catalog.task_count());
        assert_eq!(ind.machine_assignment.len(), ind.blocks.len());
        assert!(ind.machine_assignment.iter().all(|&m| m < 2));
        assert_eq!(ind.fitness, f64::INFINITY);

        let mut sorted = ind.sequence.clone();
        sorted.sort_by_key(|t| (t.order, t.unit, t.op == OpCode::Op2));
        let mut expected = catalog.tasks.clone();
        expected.sort_by_key(|t| (t.order, t.unit, t.op == OpCode::Op2));
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_random_individual_respects_precedence() {
        let catalog = sample_catalog();
        let mut rng = SmallRng::seed_from_u64(42);

        for _ in 0..50 {
            let ind = Individual::random(&catalog, 40, 2, &mut rng);
            for (order, unit) in [(0usize, 0u32), (0, 1), (0, 2)] {
                let p1 = ind
                    .sequence
                    .iter()
                    .position(|t| t.order == order && t.unit == unit && t.op == OpCode::Op1)
                    .unwrap();
                let p2 = ind
                    .sequence
                    .iter()
                    .position(|t| t.order == order && t.unit == unit && t.op == OpCode::Op2)
                    .unwrap();
                assert!(p1 < p2);
            }
        }
    }

    #[test]
    fn test_repair_swaps_only_reversed_pairs() {
        let mut seq = vec![
            TaskRef { order: 0, unit: 0, op: OpCode::Op2 },
            TaskRef { order: 1, unit: 0, op: OpCode::Op1 },
            TaskRef { order: 0, unit: 0, op: OpCode::Op1 },
        ];
        repair_precedence(&mut seq);
        assert_eq!(seq[0], TaskRef { order: 0, unit: 0, op: OpCode::Op1 });
        assert_eq!(seq[1], TaskRef { order: 1, unit: 0, op: OpCode::Op1 });
        assert_eq!(seq[2], TaskRef { order: 0, unit: 0, op: OpCode::Op2 });
    }

    #[test]
    fn test_evaluate_fills_metrics() {
        let catalog = sample_catalog();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut ind = Individual::random(&catalog, 40, 2, &mut rng);

        ind.evaluate(&catalog, 2, 30.0, Objective::Makespan);
        assert!(ind.fitness.is_finite());
        assert!(ind.makespan > 0.0);
        assert_eq!(ind.fitness, ind.makespan);
    }

    #[test]
    fn test_evaluate_penalizes_broken_assignment() {
        let catalog = sample_catalog();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut ind = Individual::random(&catalog, 40, 2, &mut rng);
        ind.machine_assignment.clear();

        ind.evaluate(&catalog, 2, 30.0, Objective::Makespan);
        assert_eq!(ind.fitness, f64::INFINITY);
    }

    #[test]
    fn test_rebuild_reconciles_assignment_length() {
        let catalog = sample_catalog();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut ind = Individual::random(&catalog, 40, 2, &mut rng);

        // Force a rebuild under a tighter capacity: more blocks appear
        // and the assignment must grow to match.
        ind.rebuild_blocks(&catalog, 2, 2, &mut rng);
        assert_eq!(ind.machine_assignment.len(), ind.blocks.len());
        assert!(ind.machine_assignment.iter().all(|&m| m < 2));
    }
}

//! Deterministic schedule simulator.
//!
//! Replays a block structure plus machine assignment into timestamps. The
//! same walk serves two purposes:
//!
//! - **Fitness**: [`simulate`] returns aggregate makespan, total lateness,
//!   and machine load variance for the genetic search.
//! - **Decoding**: [`decode_timeline`] materializes the walk into absolute
//!   timeline entries for reporting.
//!
//! Both run the identical algorithm, so the decoded makespan always equals
//! the fitness makespan for the same individual.
//!
//! # Algorithm
//!
//! Blocks are visited in the order they appear in the individual. Each
//! block starts at its machine's availability plus one fixed setup. Tasks
//! inside a block run back to back on a cursor; an OP2 task additionally
//! waits for its unit's OP1 completion plus the rotation delay, and every
//! task pays the order's per-unit loading delay before starting.
//!
//! The simulator is a pure function of its inputs and holds no state
//! across calls, so distinct individuals may be evaluated concurrently.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::blocks::Block;
use crate::catalog::{Catalog, OpCode, TaskRef};
use crate::models::{EntryKind, Machine, TimelineEntry};

/// Optimization objective for the scalar fitness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Objective {
    /// Minimize the completion time of the last machine.
    #[default]
    Makespan,
    /// Minimize total lateness, with makespan as a secondary term.
    Delay,
    /// Minimize machine load variance, with makespan as a secondary term.
    Balance,
    /// Weighted combination of all three.
    MultiObjective,
}

/// Aggregate result of one simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    /// Completion time of the last machine (minutes from schedule start).
    pub makespan: f64,
    /// Sum over units of max(0, completion − due time), in minutes.
    /// Units of orders without a due date contribute nothing.
    pub total_delay: f64,
    /// Population variance of final per-machine completion times.
    pub load_variance: f64,
    /// Final completion time per machine.
    pub machine_ends: Vec<f64>,
    /// Number of flagged over-capacity singleton blocks scheduled.
    pub over_capacity_blocks: usize,
}

impl ScheduleOutcome {
    /// Scalar fitness (lower = better) under the given objective.
    pub fn scalar_fitness(&self, objective: Objective) -> f64 {
        match objective {
            Objective::Makespan => self.makespan,
            Objective::Delay => self.total_delay + 0.1 * self.makespan,
            Objective::Balance => self.load_variance + 0.1 * self.makespan,
            Objective::MultiObjective => {
                self.makespan + 0.1 * self.total_delay + 0.05 * self.load_variance
            }
        }
    }
}

/// Simulation failure. Local to one individual: the population loop maps
/// these to a sentinel fitness instead of aborting the generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Machine assignment length does not match the block count.
    #[error("machine assignment has {assigned} entries for {blocks} blocks")]
    AssignmentMismatch { assigned: usize, blocks: usize },
    /// A block is assigned to a machine index that does not exist.
    #[error("block {block} assigned to machine {machine} of {machines}")]
    MachineOutOfRange {
        block: usize,
        machine: usize,
        machines: usize,
    },
    /// An OP2 task was simulated before its unit's OP1 completed.
    #[error("OP2 of order {order} unit {unit} scheduled before OP1")]
    PrecedenceFault { order: usize, unit: u32 },
}

/// One scheduling event emitted by the walk, in machine-relative minutes.
#[derive(Debug, Clone, Copy)]
enum Placement {
    /// Block setup on its machine.
    Setup {
        block: usize,
        machine: usize,
        start_min: f64,
        end_min: f64,
    },
    /// One task machined inside its block.
    Task {
        task: TaskRef,
        machine: usize,
        start_min: f64,
        end_min: f64,
    },
}

/// Core walk shared by fitness evaluation and timeline decoding. Events
/// are emitted in execution order through a single callback so one sink
/// can own them.
fn walk(
    catalog: &Catalog,
    blocks: &[Block],
    machine_assignment: &[usize],
    machine_count: usize,
    setup_time_min: f64,
    mut on_event: impl FnMut(Placement),
) -> Result<ScheduleOutcome, SimError> {
    if machine_assignment.len() != blocks.len() {
        return Err(SimError::AssignmentMismatch {
            assigned: machine_assignment.len(),
            blocks: blocks.len(),
        });
    }

    let mut machine_ends = vec![0.0_f64; machine_count];
    let mut op1_done: HashMap<(usize, u32), f64> = HashMap::new();
    let mut total_delay = 0.0;
    let mut over_capacity_blocks = 0;

    for (block_idx, block) in blocks.iter().enumerate() {
        let machine = machine_assignment[block_idx];
        if machine >= machine_count {
            return Err(SimError::MachineOutOfRange {
                block: block_idx,
                machine,
                machines: machine_count,
            });
        }
        if block.over_capacity {
            over_capacity_blocks += 1;
        }

        let setup_start = machine_ends[machine];
        let mut cursor = setup_start + setup_time_min;
        on_event(Placement::Setup {
            block: block_idx,
            machine,
            start_min: setup_start,
            end_min: cursor,
        });

        for &task in &block.tasks {
            let info = catalog.order(task);

            let mut ready = cursor;
            if task.op == OpCode::Op2 {
                let op1_end = op1_done.get(&(task.order, task.unit)).copied().ok_or(
                    SimError::PrecedenceFault {
                        order: task.order,
                        unit: task.unit,
                    },
                )?;
                ready = ready.max(op1_end + info.rotation_delay_min);
            }
            ready += info.load_delay_min;

            let start = cursor.max(ready);
            let end = start + info.op(task.op).duration_min;
            cursor = end;

            if task.op == OpCode::Op1 && info.has_op2() {
                op1_done.insert((task.order, task.unit), end);
            }

            // Lateness accrues when the unit's final operation finishes
            // past the order's due time.
            let is_final_op = task.op == OpCode::Op2 || !info.has_op2();
            if is_final_op {
                if let Some(due) = info.due_min {
                    total_delay += (end - due).max(0.0);
                }
            }

            on_event(Placement::Task {
                task,
                machine,
                start_min: start,
                end_min: end,
            });
        }

        machine_ends[machine] = cursor;
    }

    let makespan = machine_ends.iter().copied().fold(0.0, f64::max);
    let load_variance = variance(&machine_ends);

    Ok(ScheduleOutcome {
        makespan,
        total_delay,
        load_variance,
        machine_ends,
        over_capacity_blocks,
    })
}

/// Population variance. Zero for fewer than two machines.
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Evaluates a block structure + machine assignment into aggregate metrics.
pub fn simulate(
    catalog: &Catalog,
    blocks: &[Block],
    machine_assignment: &[usize],
    machine_count: usize,
    setup_time_min: f64,
) -> Result<ScheduleOutcome, SimError> {
    walk(
        catalog,
        blocks,
        machine_assignment,
        machine_count,
        setup_time_min,
        |_| {},
    )
}

/// Decodes a block structure into an absolute timeline anchored at `start`.
///
/// Same walk as [`simulate`]; the returned entries are ordered by machine
/// visit order (setups interleaved with their block's tasks).
pub fn decode_timeline(
    catalog: &Catalog,
    blocks: &[Block],
    machine_assignment: &[usize],
    machines: &[Machine],
    setup_time_min: f64,
    start: chrono::NaiveDateTime,
) -> Result<Vec<TimelineEntry>, SimError> {
    let at = |minutes: f64| start + chrono::Duration::seconds((minutes * 60.0).round() as i64);
    let mut entries = Vec::new();

    walk(
        catalog,
        blocks,
        machine_assignment,
        machines.len(),
        setup_time_min,
        |event| match event {
            Placement::Setup {
                block,
                machine,
                start_min,
                end_min,
            } => entries.push(TimelineEntry {
                label: format!("Setup B{}", block + 1),
                machine_id: machines[machine].id.clone(),
                start: at(start_min),
                end: at(end_min),
                kind: EntryKind::Setup,
                order_id: None,
                unit: None,
                operation: None,
            }),
            Placement::Task {
                task,
                machine,
                start_min,
                end_min,
            } => entries.push(TimelineEntry {
                label: catalog.task_label(task),
                machine_id: machines[machine].id.clone(),
                start: at(start_min),
                end: at(end_min),
                kind: EntryKind::Production,
                order_id: Some(catalog.order(task).id.clone()),
                unit: Some(task.unit),
                operation: Some(task.op),
            }),
        },
    )?;

    Ok(entries)
}

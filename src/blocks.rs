//! Block partitioning.
//!
//! A block is a run of tasks executed contiguously on one machine with a
//! single setup. Two rules bound what a block may contain:
//!
//! 1. **Fixture homogeneity** — every task in the block uses the same
//!    fixture.
//! 2. **Tool capacity** — the union of tool ids required by the block's
//!    tasks fits the magazine capacity.
//!
//! The builder walks a task sequence left to right and closes the current
//! block whenever the next task would break either rule. Output blocks are
//! an exact partition of the input sequence: no reordering, no loss, no
//! duplication.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::{Catalog, TaskRef};

/// A contiguous group of tasks sharing one setup and one fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Tasks in execution order.
    pub tasks: Vec<TaskRef>,
    /// Fixture id shared by all tasks (None for fixtureless piece types).
    pub fixture: Option<String>,
    /// Union of tool ids required by the block.
    pub tools: BTreeSet<String>,
    /// Set when a single task alone needs more tools than the magazine
    /// holds. The task is kept as a singleton block rather than dropped;
    /// downstream consumers decide how to treat it.
    pub over_capacity: bool,
}

impl Block {
    /// Number of distinct tools the block requires.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

/// Partitions `sequence` into blocks under `tool_capacity`.
///
/// Deterministic function of its inputs. A task extends the current block
/// iff the block is empty or shares its fixture, and the tool union stays
/// within capacity; otherwise the block is closed and a new one starts.
/// A task whose own tool set exceeds capacity becomes a singleton block
/// flagged `over_capacity`.
pub fn build_blocks(catalog: &Catalog, sequence: &[TaskRef], tool_capacity: usize) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for &task in sequence {
        let fixture = &catalog.order(task).fixture;
        let tools = &catalog.op(task).tools;

        // Degenerate case: the task alone overflows the magazine. Emit it
        // as a flagged singleton so no task is ever silently dropped.
        if tools.len() > tool_capacity {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            blocks.push(Block {
                tasks: vec![task],
                fixture: fixture.clone(),
                tools: tools.clone(),
                over_capacity: true,
            });
            continue;
        }

        let fits = match &current {
            Some(block) => {
                block.fixture == *fixture
                    && block.tools.union(tools).count() <= tool_capacity
            }
            None => true,
        };

        if fits {
            let block = current.get_or_insert_with(|| Block {
                tasks: Vec::new(),
                fixture: fixture.clone(),
                tools: BTreeSet::new(),
                over_capacity: false,
            });
            block.tasks.push(task);
            block.tools.extend(tools.iter().cloned());
        } else {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(Block {
                tasks: vec![task],
                fixture: fixture.clone(),
                tools: tools.clone(),
                over_capacity: false,
            });
        }
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    blocks
}

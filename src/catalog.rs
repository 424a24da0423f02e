//! Order/task catalog.
//!
//! Flattens manufacturing orders into atomic per-unit tasks and precomputes
//! everything the simulator needs per order: tool sets and durations per
//! operation, fixture, delays, and the due time in minutes relative to the
//! schedule epoch. Built once at optimizer construction and shared
//! read-only by every simulation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{ManufacturingOrder, PalletType};

/// Operation selector within a piece type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    /// First machining operation.
    Op1,
    /// Second machining operation (after table rotation).
    Op2,
}

impl OpCode {
    /// Short display form ("OP1"/"OP2").
    pub fn as_str(self) -> &'static str {
        match self {
            OpCode::Op1 => "OP1",
            OpCode::Op2 => "OP2",
        }
    }
}

/// An atomic schedulable task: one operation of one unit of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    /// Index into [`Catalog::orders`].
    pub order: usize,
    /// Unit index in `0..quantity`.
    pub unit: u32,
    /// Which operation of the unit.
    pub op: OpCode,
}

/// Precomputed per-operation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpInfo {
    /// Operation code from the piece type (e.g. "OP10").
    pub code: String,
    /// Machining duration per unit (minutes).
    pub duration_min: f64,
    /// Required tool ids.
    pub tools: BTreeSet<String>,
}

/// Precomputed per-order data, read by every simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInfo {
    /// Order id.
    pub id: String,
    /// Shop-floor reference for labels.
    pub reference: String,
    /// Piece type name.
    pub piece_type: String,
    /// Units to produce.
    pub quantity: u32,
    /// Scheduling priority.
    pub priority: i32,
    /// Due time in minutes from the schedule epoch. `None` = no due date.
    pub due_min: Option<f64>,
    /// Fixture id shared by all tasks of this order.
    pub fixture: Option<String>,
    /// Pallet family.
    pub pallet: PalletType,
    /// Machine loading delay per unit (minutes).
    pub load_delay_min: f64,
    /// Table rotation delay between OP1 and OP2 of one unit (minutes).
    pub rotation_delay_min: f64,
    /// First operation.
    pub op1: OpInfo,
    /// Second operation, if the piece type defines one.
    pub op2: Option<OpInfo>,
}

impl OrderInfo {
    /// Whether units of this order need a second operation.
    pub fn has_op2(&self) -> bool {
        self.op2.is_some()
    }

    /// Operation data for the given op code.
    ///
    /// # Panics
    /// Panics if `Op2` is requested for a single-operation order. The
    /// catalog never emits such a task, so this indicates a corrupted
    /// sequence.
    pub fn op(&self, code: OpCode) -> &OpInfo {
        match code {
            OpCode::Op1 => &self.op1,
            OpCode::Op2 => self
                .op2
                .as_ref()
                .expect("OP2 task for single-operation order"),
        }
    }
}

/// Read-only task catalog shared by all individuals of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Per-order precomputed data.
    pub orders: Vec<OrderInfo>,
    /// All schedulable tasks in canonical order (per order, per unit,
    /// OP1 before OP2).
    pub tasks: Vec<TaskRef>,
}

impl Catalog {
    /// Builds the catalog from orders.
    ///
    /// Due dates are converted to minutes relative to `epoch` (the
    /// schedule start); orders due before the epoch get negative due
    /// times and accrue lateness from the first minute.
    pub fn build(orders: &[ManufacturingOrder], epoch: NaiveDateTime) -> Self {
        let mut infos = Vec::with_capacity(orders.len());
        let mut tasks = Vec::new();

        for (idx, order) in orders.iter().enumerate() {
            let pt = &order.piece_type;
            infos.push(OrderInfo {
                id: order.id.clone(),
                reference: order.reference.clone(),
                piece_type: pt.name.clone(),
                quantity: order.quantity,
                priority: order.priority,
                due_min: order
                    .due_date
                    .map(|due| (due - epoch).num_seconds() as f64 / 60.0),
                fixture: pt.fixture_id.clone(),
                pallet: pt.pallet,
                load_delay_min: order.load_delay_min,
                rotation_delay_min: order.rotation_delay_min,
                op1: OpInfo {
                    code: pt.op1.code.clone(),
                    duration_min: pt.op1.duration_min,
                    tools: pt.op1.tools.clone(),
                },
                op2: pt.op2.as_ref().map(|op| OpInfo {
                    code: op.code.clone(),
                    duration_min: op.duration_min,
                    tools: op.tools.clone(),
                }),
            });

            for unit in 0..order.quantity {
                tasks.push(TaskRef {
                    order: idx,
                    unit,
                    op: OpCode::Op1,
                });
                if pt.op2.is_some() {
                    tasks.push(TaskRef {
                        order: idx,
                        unit,
                        op: OpCode::Op2,
                    });
                }
            }
        }

        Self {
            orders: infos,
            tasks,
        }
    }

    /// Order data for a task.
    #[inline]
    pub fn order(&self, task: TaskRef) -> &OrderInfo {
        &self.orders[task.order]
    }

    /// Operation data for a task.
    #[inline]
    pub fn op(&self, task: TaskRef) -> &OpInfo {
        self.order(task).op(task.op)
    }

    /// Number of schedulable tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Display label for a task (e.g. "OF001 · P3 OP1").
    pub fn task_label(&self, task: TaskRef) -> String {
        format!(
            "{} · P{} {}",
            self.order(task).reference,
            task.unit + 1,
            task.op.as_str()
        )
    }
}

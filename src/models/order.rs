//! Manufacturing order and piece type models.
//!
//! An order requests a quantity of one piece type. The piece type defines
//! the machining process: operation 1 (always present), an optional
//! operation 2 performed after a table rotation, the fixture the pieces
//! are clamped on, and the pallet family.
//!
//! # Time Representation
//! All durations and delays are in minutes. Due dates are absolute
//! timestamps; the optimizer converts them to minutes relative to the
//! configured schedule start.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A machining operation of a piece type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Operation code (e.g. "OP10", "OP20").
    pub code: String,
    /// Standard machining duration per unit (minutes).
    pub duration_min: f64,
    /// Tool ids that must be loaded in the machine magazine.
    pub tools: BTreeSet<String>,
}

impl Operation {
    /// Creates an operation with the given code and per-unit duration.
    pub fn new(code: impl Into<String>, duration_min: f64) -> Self {
        Self {
            code: code.into(),
            duration_min,
            tools: BTreeSet::new(),
        }
    }

    /// Adds a required tool id.
    pub fn with_tool(mut self, tool_id: impl Into<String>) -> Self {
        self.tools.insert(tool_id.into());
        self
    }

    /// Adds several required tool ids.
    pub fn with_tools<I, S>(mut self, tool_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tool_ids.into_iter().map(Into::into));
        self
    }
}

/// Pallet family a piece type is mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PalletType {
    /// Small pallet (ITS148).
    Small,
    /// Big pallet (PC210).
    Big,
}

/// A piece type: the process definition shared by all units of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceType {
    /// Piece type reference (e.g. "PIECE_A").
    pub name: String,
    /// First operation, always required.
    pub op1: Operation,
    /// Second operation, performed after table rotation. `None` for
    /// single-operation pieces.
    pub op2: Option<Operation>,
    /// Fixture (clamping device) id. Tasks sharing a block must share
    /// this fixture.
    pub fixture_id: Option<String>,
    /// Pallet family.
    pub pallet: PalletType,
}

impl PieceType {
    /// Creates a single-operation piece type.
    pub fn new(name: impl Into<String>, op1: Operation, pallet: PalletType) -> Self {
        Self {
            name: name.into(),
            op1,
            op2: None,
            fixture_id: None,
            pallet,
        }
    }

    /// Sets the second operation.
    pub fn with_op2(mut self, op2: Operation) -> Self {
        self.op2 = Some(op2);
        self
    }

    /// Sets the fixture id.
    pub fn with_fixture(mut self, fixture_id: impl Into<String>) -> Self {
        self.fixture_id = Some(fixture_id.into());
        self
    }

    /// Total distinct tools across both operations.
    pub fn total_tool_count(&self) -> usize {
        let mut tools = self.op1.tools.clone();
        if let Some(op2) = &self.op2 {
            tools.extend(op2.tools.iter().cloned());
        }
        tools.len()
    }
}

/// A manufacturing order: a quantity of one piece type with a due date.
///
/// Immutable once optimization starts; the optimizer reads orders through
/// the catalog and never writes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturingOrder {
    /// Unique order identifier.
    pub id: String,
    /// Shop-floor reference (e.g. "OF001"). Used in timeline labels.
    pub reference: String,
    /// Number of units to produce. Must be positive.
    pub quantity: u32,
    /// Latest completion timestamp. `None` = no due date.
    pub due_date: Option<NaiveDateTime>,
    /// Scheduling priority (higher = more important).
    pub priority: i32,
    /// Process definition.
    pub piece_type: PieceType,
    /// Machine loading time per unit (minutes).
    pub load_delay_min: f64,
    /// Table rotation time between OP1 and OP2 of one unit (minutes).
    pub rotation_delay_min: f64,
}

impl ManufacturingOrder {
    /// Creates an order for `quantity` units of `piece_type`.
    pub fn new(id: impl Into<String>, quantity: u32, piece_type: PieceType) -> Self {
        let id = id.into();
        Self {
            reference: id.clone(),
            id,
            quantity,
            due_date: None,
            priority: 0,
            piece_type,
            load_delay_min: 0.0,
            rotation_delay_min: 0.0,
        }
    }

    /// Sets the shop-floor reference label.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Sets the due date.
    pub fn with_due_date(mut self, due: NaiveDateTime) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the per-unit machine loading delay (minutes).
    pub fn with_load_delay(mut self, minutes: f64) -> Self {
        self.load_delay_min = minutes;
        self
    }

    /// Sets the per-unit table rotation delay (minutes).
    pub fn with_rotation_delay(mut self, minutes: f64) -> Self {
        self.rotation_delay_min = minutes;
        self
    }

    /// Number of schedulable tasks this order expands to.
    pub fn task_count(&self) -> usize {
        let per_unit = if self.piece_type.op2.is_some() { 2 } else { 1 };
        self.quantity as usize * per_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_piece() -> PieceType {
        PieceType::new(
            "PIECE_A",
            Operation::new("OP10", 15.0).with_tools(["t1", "t2", "t3"]),
            PalletType::Small,
        )
        .with_op2(Operation::new("OP20", 25.0).with_tools(["t3", "t4"]))
        .with_fixture("F1")
    }

    #[test]
    fn test_order_builder() {
        let order = ManufacturingOrder::new("O1", 10, sample_piece())
            .with_reference("OF001")
            .with_priority(2)
            .with_load_delay(5.0)
            .with_rotation_delay(2.0);

        assert_eq!(order.id, "O1");
        assert_eq!(order.reference, "OF001");
        assert_eq!(order.quantity, 10);
        assert_eq!(order.priority, 2);
        assert!(order.due_date.is_none());
    }

    #[test]
    fn test_task_count() {
        let two_op = ManufacturingOrder::new("O1", 10, sample_piece());
        assert_eq!(two_op.task_count(), 20);

        let single = ManufacturingOrder::new(
            "O2",
            4,
            PieceType::new("PIECE_C", Operation::new("OP20", 10.0), PalletType::Big),
        );
        assert_eq!(single.task_count(), 4);
    }

    #[test]
    fn test_total_tool_count_dedups_shared_tools() {
        // t3 required by both operations, counted once
        assert_eq!(sample_piece().total_tool_count(), 4);
    }

    #[test]
    fn test_order_serde_roundtrip() {
        let order = ManufacturingOrder::new("O1", 3, sample_piece());
        let json = serde_json::to_string(&order).unwrap();
        let back: ManufacturingOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "O1");
        assert_eq!(back.quantity, 3);
        assert_eq!(back.piece_type.total_tool_count(), 4);
    }
}

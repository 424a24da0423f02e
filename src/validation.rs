//! Input validation for orders and machines.
//!
//! Collects every problem in one pass instead of stopping at the first,
//! so callers can surface a complete report to the planner.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{Machine, ManufacturingOrder};

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate order id {0:?}")]
    DuplicateOrderId(String),
    #[error("duplicate machine id {0:?}")]
    DuplicateMachineId(String),
    #[error("order {0:?} has zero quantity")]
    InvalidQuantity(String),
    #[error("machine {0:?} has zero tool capacity")]
    InvalidCapacity(String),
    #[error("order {order:?} operation {operation:?} has non-positive duration")]
    InvalidDuration { order: String, operation: String },
}

/// `Ok(())` when the inputs are usable, otherwise every failure found.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Checks orders and machines before an optimization run.
pub fn validate(orders: &[ManufacturingOrder], machines: &[Machine]) -> ValidationResult {
    let mut errors = Vec::new();

    let mut order_ids = HashSet::new();
    for order in orders {
        if !order_ids.insert(order.id.as_str()) {
            errors.push(ValidationError::DuplicateOrderId(order.id.clone()));
        }
        if order.quantity == 0 {
            errors.push(ValidationError::InvalidQuantity(order.id.clone()));
        }
        let mut ops = vec![&order.piece_type.op1];
        if let Some(op2) = &order.piece_type.op2 {
            ops.push(op2);
        }
        for op in ops {
            if op.duration_min <= 0.0 {
                errors.push(ValidationError::InvalidDuration {
                    order: order.id.clone(),
                    operation: op.code.clone(),
                });
            }
        }
    }

    let mut machine_ids = HashSet::new();
    for machine in machines {
        if !machine_ids.insert(machine.id.as_str()) {
            errors.push(ValidationError::DuplicateMachineId(machine.id.clone()));
        }
        if machine.tool_capacity == 0 {
            errors.push(ValidationError::InvalidCapacity(machine.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, PalletType, PieceType};

    fn piece() -> PieceType {
        PieceType::new(
            "PIECE",
            Operation::new("OP10", 12.0).with_tool("t1"),
            PalletType::Small,
        )
    }

    #[test]
    fn test_valid_inputs_pass() {
        let orders = vec![
            ManufacturingOrder::new("O1", 3, piece()),
            ManufacturingOrder::new("O2", 1, piece()),
        ];
        let machines = vec![Machine::new("M1", 40), Machine::new("M2", 24)];
        assert!(validate(&orders, &machines).is_ok());
    }

    #[test]
    fn test_duplicate_ids_detected() {
        let orders = vec![
            ManufacturingOrder::new("O1", 3, piece()),
            ManufacturingOrder::new("O1", 2, piece()),
        ];
        let machines = vec![Machine::new("M1", 40), Machine::new("M1", 40)];

        let errors = validate(&orders, &machines).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateOrderId("O1".into())));
        assert!(errors.contains(&ValidationError::DuplicateMachineId("M1".into())));
    }

    #[test]
    fn test_zero_quantity_and_capacity_detected() {
        let orders = vec![ManufacturingOrder::new("O1", 0, piece())];
        let machines = vec![Machine::new("M1", 0)];

        let errors = validate(&orders, &machines).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&ValidationError::InvalidQuantity("O1".into())));
        assert!(errors.contains(&ValidationError::InvalidCapacity("M1".into())));
    }

    #[test]
    fn test_non_positive_duration_detected() {
        let bad = PieceType::new(
            "PIECE",
            Operation::new("OP10", 0.0).with_tool("t1"),
            PalletType::Small,
        )
        .with_op2(Operation::new("OP20", -5.0));
        let orders = vec![ManufacturingOrder::new("O1", 1, bad)];
        let machines = vec![Machine::new("M1", 40)];

        let errors = validate(&orders, &machines).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidDuration {
                    order: "O1".into(),
                    operation: "OP10".into(),
                },
                ValidationError::InvalidDuration {
                    order: "O1".into(),
                    operation: "OP20".into(),
                },
            ]
        );
    }

    #[test]
    fn test_all_errors_reported_in_one_pass() {
        let orders = vec![
            ManufacturingOrder::new("O1", 0, piece()),
            ManufacturingOrder::new("O1", 2, piece()),
        ];
        let machines: Vec<Machine> = Vec::new();

        let errors = validate(&orders, &machines).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}

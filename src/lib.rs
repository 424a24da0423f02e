//! Block-based scheduling of manufacturing orders onto CNC machines.
//!
//! The central constraint is the machine tool magazine: a *block* is a run
//! of tasks executed back to back on one machine with a single setup, and
//! the union of tool ids required by a block must fit the magazine. Blocks
//! additionally require a single fixture. Optimization is a genetic search
//! over task permutations: blocks are derived from the permutation by a
//! deterministic partition pass, machine assignments are evolved per block,
//! and a timeline simulator scores each candidate.
//!
//! # Modules
//!
//! - **`models`**: Input/output value objects — `ManufacturingOrder`,
//!   `PieceType`, `Operation`, `Machine`, `TimelineEntry`
//! - **`catalog`**: Flattens orders into per-unit schedulable tasks with
//!   precomputed durations, tool sets, and due times
//! - **`blocks`**: Capacity- and fixture-aware block partitioning
//! - **`sim`**: Deterministic schedule simulator (fitness + decoding)
//! - **`ga`**: Genetic operators — tournament selection, order crossover,
//!   mutation variants, elitist replacement
//! - **`optimizer`**: Generation loop, configuration, convergence stats
//! - **`validation`**: Input integrity checks
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Cheng et al. (1996), "A Tutorial Survey of JSSP using GA"

pub mod blocks;
pub mod catalog;
pub mod ga;
pub mod models;
pub mod optimizer;
pub mod sim;
pub mod validation;

pub use blocks::{build_blocks, Block};
pub use catalog::{Catalog, OpCode, OrderInfo, TaskRef};
pub use models::{
    EntryKind, Machine, ManufacturingOrder, Operation, PalletType, PieceType, TimelineEntry,
};
pub use optimizer::{Optimizer, OptimizerConfig, OptimizerError, OptimizerResult, OptimizerStats};
pub use sim::{Objective, ScheduleOutcome};
pub use validation::{validate, ValidationError, ValidationResult};

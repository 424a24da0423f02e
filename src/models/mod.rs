//! Domain models for block-based CNC scheduling.
//!
//! Input objects (`ManufacturingOrder`, `PieceType`, `Operation`, `Machine`)
//! are value types supplied by the caller; the optimizer never mutates them.
//! `TimelineEntry` is the output contract consumed by visualization and
//! export collaborators.

mod machine;
mod order;
mod timeline;

pub use machine::Machine;
pub use order::{ManufacturingOrder, Operation, PalletType, PieceType};
pub use timeline::{EntryKind, TimelineEntry};

//! Decoded schedule timeline.
//!
//! The timeline is the sole contract handed to external reporting
//! collaborators (Gantt rendering, spreadsheet export, persistence). The
//! core has no dependency on their formats.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::catalog::OpCode;

/// Classification of a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Machine setup at the start of a block.
    Setup,
    /// Machining of one unit.
    Production,
}

/// One bar of the decoded schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Display label (e.g. "Setup B2", "OF001 · P3 OP1").
    pub label: String,
    /// Machine id the entry runs on.
    pub machine_id: String,
    /// Absolute start timestamp.
    pub start: NaiveDateTime,
    /// Absolute end timestamp.
    pub end: NaiveDateTime,
    /// Setup or production.
    pub kind: EntryKind,
    /// Order id for production entries.
    pub order_id: Option<String>,
    /// Unit index (0-based) for production entries.
    pub unit: Option<u32>,
    /// Operation for production entries.
    pub operation: Option<OpCode>,
}

impl TimelineEntry {
    /// Entry duration in minutes.
    pub fn duration_min(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_duration_min() {
        let start = NaiveDate::from_ymd_opt(2025, 11, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let entry = TimelineEntry {
            label: "Setup B1".into(),
            machine_id: "M1".into(),
            start,
            end: start + chrono::Duration::minutes(30),
            kind: EntryKind::Setup,
            order_id: None,
            unit: None,
            operation: None,
        };
        assert!((entry.duration_min() - 30.0).abs() < 1e-9);
    }
}

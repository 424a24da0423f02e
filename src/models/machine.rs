//! CNC machine model.

use serde::{Deserialize, Serialize};

/// A CNC machine with a tool magazine of fixed capacity.
///
/// The block builder uses the minimum capacity across all machines as its
/// threshold, so every emitted block is loadable on every machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    /// Unique machine identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Maximum number of distinct tools loadable at once.
    pub tool_capacity: u32,
}

impl Machine {
    /// Creates a machine with the given magazine capacity.
    pub fn new(id: impl Into<String>, tool_capacity: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            tool_capacity,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

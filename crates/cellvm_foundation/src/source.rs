//! Positions in script source, used for diagnostics.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position in a script module.
///
/// Runtime positions are optional (`Option<SourcePosition>`): they are absent
/// when debugging is disabled or when a value originates inside the VM.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourcePosition {
    /// Name of the module containing the position.
    pub module_name: String,
    /// One-based line number (zero for synthetic positions).
    pub line: u32,
    /// One-based column number (zero for synthetic positions).
    pub column: u32,
}

impl SourcePosition {
    /// Creates a new source position.
    #[must_use]
    pub fn new(module_name: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            module_name: module_name.into(),
            line,
            column,
        }
    }

    /// A position for something declared by the core library, such as a
    /// standard opcode or type.
    #[must_use]
    pub fn core(name: &str) -> Self {
        Self::new(format!("$.core.{name}"), 0, 0)
    }

    /// A position for something created inside the VM itself.
    #[must_use]
    pub fn internal(name: &str) -> Self {
        Self::new(format!("$.internal.{name}"), 0, 0)
    }

    /// Returns true if this position does not point into a user script.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.module_name.starts_with("$.")
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module_name, self.line, self.column)
    }
}

//! Debug event and record types.

use std::fmt;

use cellvm_foundation::{Parameters, Problem, ProblemId, SourcePosition};
use cellvm_memory::{CallableValue, CellKind, EvaluatedValue, MemoryCell, MemoryIndex, MemoryValue};

// =============================================================================
// Debug Event
// =============================================================================

/// Something the interpreter reported through its debugger hooks.
#[derive(Clone, Debug)]
pub enum DebugEvent {
    /// A free-form message.
    Log {
        /// The message.
        message: String,
        /// Its parameters.
        parameters: Parameters,
    },

    /// A run failed.
    Error {
        /// The error.
        problem: Problem,
    },

    /// A function call started.
    FunctionStarted {
        /// Where the function was defined.
        source: Option<SourcePosition>,
    },

    /// A function call produced its value.
    FunctionReturned {
        /// Where the function was defined.
        source: Option<SourcePosition>,
        /// Kind of the value, or `None` if it was left unevaluated.
        kind: Option<&'static str>,
    },

    /// An opcode cell is about to run.
    OpcodeStarted {
        /// Cell index within its function.
        index: MemoryIndex,
        /// The opcode's mnemonic.
        opcode: String,
    },

    /// An opcode cell produced its value.
    OpcodeResolved {
        /// Cell index within its function.
        index: MemoryIndex,
        /// The opcode's mnemonic.
        opcode: String,
        /// Rendering of the value.
        value: String,
    },
}

impl DebugEvent {
    /// A function start.
    #[must_use]
    pub fn function_started(function: &CallableValue) -> Self {
        Self::FunctionStarted {
            source: function.source.clone(),
        }
    }

    /// A function return.
    #[must_use]
    pub fn function_returned(function: &CallableValue, value: &MemoryValue) -> Self {
        Self::FunctionReturned {
            source: function.source.clone(),
            kind: value.value().map(EvaluatedValue::kind_name),
        }
    }

    /// An opcode start.
    #[must_use]
    pub fn opcode_started(index: MemoryIndex, cell: &MemoryCell) -> Self {
        Self::OpcodeStarted {
            index,
            opcode: mnemonic(cell).to_string(),
        }
    }

    /// An opcode result.
    #[must_use]
    pub fn opcode_resolved(index: MemoryIndex, cell: &MemoryCell, value: &MemoryValue) -> Self {
        Self::OpcodeResolved {
            index,
            opcode: mnemonic(cell).to_string(),
            value: value.value().map_or_else(|| "<pending>".to_string(), |v| format!("{v:?}")),
        }
    }

    /// Returns the event type name for filtering.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::Error { .. } => "error",
            Self::FunctionStarted { .. } => "function-started",
            Self::FunctionReturned { .. } => "function-returned",
            Self::OpcodeStarted { .. } => "opcode-started",
            Self::OpcodeResolved { .. } => "opcode-resolved",
        }
    }

    /// The error id, for [`DebugEvent::Error`].
    #[must_use]
    pub fn problem_id(&self) -> Option<ProblemId> {
        match self {
            Self::Error { problem } => Some(problem.id),
            _ => None,
        }
    }
}

/// The mnemonic of an opcode cell, or the kind name of any other cell.
pub(crate) fn mnemonic(cell: &MemoryCell) -> &str {
    match &cell.kind {
        CellKind::Opcode { opcode, .. } => opcode,
        other => other.as_str(),
    }
}

fn source_or_unknown(source: Option<&SourcePosition>) -> String {
    source.map_or_else(|| "<unknown>".to_string(), ToString::to_string)
}

impl fmt::Display for DebugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log { message, parameters } if parameters.is_empty() => write!(f, "log: {message}"),
            Self::Log { message, parameters } => write!(f, "log: {message} {parameters:?}"),
            Self::Error { problem } => write!(f, "error: {problem}"),
            Self::FunctionStarted { source } => {
                write!(f, "call {}", source_or_unknown(source.as_ref()))
            }
            Self::FunctionReturned { source, kind } => write!(
                f,
                "return {} ({})",
                source_or_unknown(source.as_ref()),
                kind.unwrap_or("pending")
            ),
            Self::OpcodeStarted { index, opcode } => write!(f, "  [{index}] {opcode}"),
            Self::OpcodeResolved { index, opcode, value } => write!(f, "  [{index}] {opcode} = {value}"),
        }
    }
}

// =============================================================================
// Debug Record
// =============================================================================

/// An event with its position in the stream.
#[derive(Clone, Debug)]
pub struct DebugRecord {
    /// Monotonic record id.
    pub id: u64,
    /// Function call nesting when the event arrived.
    pub depth: usize,
    /// The event.
    pub event: DebugEvent,
}

impl DebugRecord {
    /// Creates a record.
    #[must_use]
    pub const fn new(id: u64, depth: usize, event: DebugEvent) -> Self {
        Self { id, depth, event }
    }

    /// Returns the event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

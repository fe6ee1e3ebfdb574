//! Debugger callbacks.
//!
//! Every hook defaults to a no-op, so a host implements only what it needs.

use cellvm_foundation::{Parameters, Problem};
use cellvm_memory::{CallableValue, MemoryCell, MemoryIndex, MemoryValue};

/// Hooks called by the interpreter as it runs.
pub trait DebuggerCallbacks: Send + Sync {
    /// A free-form message.
    fn log(&self, _message: &str, _parameters: &Parameters) {}

    /// A runtime error was generated.
    fn generated_error(&self, _problem: &Problem) {}

    /// A function call is starting.
    fn function_started(&self, _function: &CallableValue) {}

    /// A function call produced its value.
    fn function_returned(&self, _function: &CallableValue, _value: &MemoryValue) {}

    /// An opcode cell is about to run. `function` is `None` for cells run
    /// outside a compiled function, such as reducer steps.
    fn opcode_evaluation_start(
        &self,
        _function: Option<&CallableValue>,
        _index: MemoryIndex,
        _cell: &MemoryCell,
    ) {
    }

    /// An opcode cell produced its value.
    fn opcode_evaluation_resolved(
        &self,
        _function: Option<&CallableValue>,
        _index: MemoryIndex,
        _cell: &MemoryCell,
        _value: &MemoryValue,
    ) {
    }
}

/// Ignores every callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDebugger;

impl DebuggerCallbacks for NoopDebugger {}

//! A debugger that forwards every callback to `tracing`.

use cellvm_foundation::{Parameters, Problem};
use cellvm_memory::{CallableValue, MemoryCell, MemoryIndex, MemoryValue};
use cellvm_vm::DebuggerCallbacks;
use tracing::Level;

use crate::config::DebugConfig;
use crate::record::DebugEvent;

/// Emits an event at a level chosen at run time.
macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::event!(target: "cellvm::debugger", Level::ERROR, $($rest)+);
        } else if level == Level::WARN {
            tracing::event!(target: "cellvm::debugger", Level::WARN, $($rest)+);
        } else if level == Level::INFO {
            tracing::event!(target: "cellvm::debugger", Level::INFO, $($rest)+);
        } else if level == Level::DEBUG {
            tracing::event!(target: "cellvm::debugger", Level::DEBUG, $($rest)+);
        } else {
            tracing::event!(target: "cellvm::debugger", Level::TRACE, $($rest)+);
        }
    }};
}

/// Forwards debugger callbacks to `tracing` under the `cellvm::debugger`
/// target.
#[derive(Clone, Debug, Default)]
pub struct TracingDebugger {
    config: DebugConfig,
}

impl TracingDebugger {
    /// Creates a forwarder.
    #[must_use]
    pub const fn new(config: DebugConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &DebugConfig {
        &self.config
    }
}

impl DebuggerCallbacks for TracingDebugger {
    fn log(&self, message: &str, parameters: &Parameters) {
        event_at!(self.config.event_level, ?parameters, "{message}");
    }

    fn generated_error(&self, problem: &Problem) {
        event_at!(self.config.error_level, id = problem.id.name(), problem = %problem, "generated error");
    }

    fn function_started(&self, function: &CallableValue) {
        event_at!(self.config.event_level, event = %DebugEvent::function_started(function), "function started");
    }

    fn function_returned(&self, function: &CallableValue, value: &MemoryValue) {
        event_at!(
            self.config.event_level,
            event = %DebugEvent::function_returned(function, value),
            "function returned"
        );
    }

    fn opcode_evaluation_start(&self, _function: Option<&CallableValue>, index: MemoryIndex, cell: &MemoryCell) {
        if self.config.opcode_events {
            event_at!(Level::TRACE, event = %DebugEvent::opcode_started(index, cell), "opcode started");
        }
    }

    fn opcode_evaluation_resolved(
        &self,
        _function: Option<&CallableValue>,
        index: MemoryIndex,
        cell: &MemoryCell,
        value: &MemoryValue,
    ) {
        if self.config.opcode_events {
            event_at!(Level::TRACE, event = %DebugEvent::opcode_resolved(index, cell, value), "opcode resolved");
        }
    }
}

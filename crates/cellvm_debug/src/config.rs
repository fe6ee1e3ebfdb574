//! Configuration for the debuggers.

use tracing::Level;

/// Configuration shared by [`TracingDebugger`](crate::TracingDebugger) and
/// [`RecordingDebugger`](crate::RecordingDebugger).
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Number of events a recording debugger keeps.
    pub history_size: usize,

    /// Level of function and log events.
    pub event_level: Level,

    /// Level of generated errors.
    pub error_level: Level,

    /// Whether per-opcode events are traced and recorded. Off by default,
    /// since a run emits two of them for every opcode cell.
    pub opcode_events: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            history_size: 1000,
            event_level: Level::DEBUG,
            error_level: Level::WARN,
            opcode_events: false,
        }
    }
}

impl DebugConfig {
    /// Everything at `TRACE`, opcode events included.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            history_size: 10_000,
            event_level: Level::TRACE,
            error_level: Level::DEBUG,
            opcode_events: true,
        }
    }

    /// Builder method to set history size.
    #[must_use]
    pub fn with_history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    /// Builder method to set the event level.
    #[must_use]
    pub fn with_event_level(mut self, level: Level) -> Self {
        self.event_level = level;
        self
    }

    /// Builder method to set the error level.
    #[must_use]
    pub fn with_error_level(mut self, level: Level) -> Self {
        self.error_level = level;
        self
    }

    /// Builder method to enable/disable opcode events.
    #[must_use]
    pub fn with_opcode_events(mut self, enabled: bool) -> Self {
        self.opcode_events = enabled;
        self
    }
}

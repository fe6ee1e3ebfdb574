//! A debugger that keeps what it is told.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use cellvm_foundation::{Parameters, Problem};
use cellvm_memory::{CallableValue, MemoryCell, MemoryIndex, MemoryValue};
use cellvm_vm::DebuggerCallbacks;

use crate::buffer::DebugBuffer;
use crate::config::DebugConfig;
use crate::record::{DebugEvent, DebugRecord};

/// Records debugger callbacks into a bounded [`DebugBuffer`].
///
/// Opcode events are only recorded when
/// [`DebugConfig::opcode_events`] is set.
#[derive(Debug)]
pub struct RecordingDebugger {
    config: DebugConfig,
    buffer: Mutex<DebugBuffer>,
    depth: AtomicUsize,
}

impl RecordingDebugger {
    /// Creates a recorder.
    #[must_use]
    pub fn new(config: DebugConfig) -> Self {
        Self {
            buffer: Mutex::new(DebugBuffer::new(config.history_size)),
            config,
            depth: AtomicUsize::new(0),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, DebugBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: DebugEvent) {
        let depth = self.depth.load(Ordering::Relaxed);
        self.buffer().push(depth, event);
    }

    /// A copy of the records currently held, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<DebugRecord> {
        self.buffer().iter().cloned().collect()
    }

    /// The event type of every record held, oldest first.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.buffer().iter().map(DebugRecord::event_type).collect()
    }

    /// Every recorded error, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<Problem> {
        self.buffer()
            .iter()
            .filter_map(|r| match &r.event {
                DebugEvent::Error { problem } => Some(problem.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    /// Drops every record.
    pub fn clear(&self) {
        self.buffer().clear();
    }
}

impl Default for RecordingDebugger {
    fn default() -> Self {
        Self::new(DebugConfig::default())
    }
}

impl DebuggerCallbacks for RecordingDebugger {
    fn log(&self, message: &str, parameters: &Parameters) {
        self.push(DebugEvent::Log {
            message: message.to_string(),
            parameters: parameters.clone(),
        });
    }

    fn generated_error(&self, problem: &Problem) {
        self.push(DebugEvent::Error {
            problem: problem.clone(),
        });
    }

    fn function_started(&self, function: &CallableValue) {
        self.push(DebugEvent::function_started(function));
        self.depth.fetch_add(1, Ordering::Relaxed);
    }

    fn function_returned(&self, function: &CallableValue, value: &MemoryValue) {
        // Saturating: a debugger set mid-run can see a return without its start.
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_sub(1)));
        self.push(DebugEvent::function_returned(function, value));
    }

    fn opcode_evaluation_start(&self, _function: Option<&CallableValue>, index: MemoryIndex, cell: &MemoryCell) {
        if self.config.opcode_events {
            self.push(DebugEvent::opcode_started(index, cell));
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
            self.push(DebugEvent::opcode_resolved(index, cell, value));
        }
    }
}

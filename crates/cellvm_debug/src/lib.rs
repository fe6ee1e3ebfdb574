//! Debuggers for the cellvm virtual machine.
//!
//! This crate provides:
//! - [`TracingDebugger`] - Forwards interpreter callbacks to `tracing`
//! - [`RecordingDebugger`] - Keeps recent callbacks in a bounded buffer
//! - [`DebugConfig`] - History size, levels and opcode events
//!
//! Either is installed with [`cellvm_vm::Interpreter::set_debugger`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod buffer;
pub mod config;
pub mod record;
pub mod recording;
pub mod tracer;

pub use buffer::DebugBuffer;
pub use config::DebugConfig;
pub use record::{DebugEvent, DebugRecord};
pub use recording::RecordingDebugger;
pub use tracer::TracingDebugger;

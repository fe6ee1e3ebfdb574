//! Opcodes, call compilation, and evaluation for the cellvm virtual machine.
//!
//! This crate provides:
//! - [`Opcode`] - The contract between the VM and an embedding system
//! - [`create_script_loader`] / [`ScriptLoader`] - Declaration and script validation
//! - [`CallCompiler`] - Turns callable constants into checked call plans
//! - [`Runtime`] - The worklist evaluator; host stack depth does not grow
//!   with script recursion
//! - [`Interpreter`] - The handle a host runs functions through
//! - [`DebuggerCallbacks`] - Observation hooks

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cancel;
pub mod compiler;
pub mod config;
pub mod debugger;
pub mod engine;
pub mod interpreter;
pub mod loader;
pub mod opcode;
pub mod validation;

pub use cancel::CancellationToken;
pub use compiler::{CallCompiler, CompileResult, CompiledCall};
pub use config::{InterpreterConfig, ReduceStrategy};
pub use debugger::{DebuggerCallbacks, NoopDebugger};
pub use engine::{Compute, Depth, Runtime, RuntimeAction, Step};
pub use interpreter::Interpreter;
pub use loader::{ScriptLoader, create_script_loader};
pub use opcode::{
    BoundTypes, EvaluationKind, GenericBinding, Opcode, OpcodeArgument, OpcodeFrame, OpcodeResult,
    OpcodeSignature, OpcodeTable, ReducerValue,
};
pub use validation::{validate_opcode, validate_opcodes};

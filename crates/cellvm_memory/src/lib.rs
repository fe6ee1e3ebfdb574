//! Memory model for the cellvm virtual machine.
//!
//! This crate provides:
//! - [`MemoryCell`] - Immutable descriptions of how values are produced
//! - [`MemoryValue`] / [`EvaluatedValue`] - Lazily evaluated, write-once values
//! - [`SpliceNode`] - A persistent rope of memory values
//! - [`LayeredStructured`] - Structures built from shared override layers
//! - [`ConstantMemory`] / [`LocalMemory`] - Shared and per-call memory
//! - [`MemoryFactory`] - Value construction for opcodes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cell;
pub mod constant;
pub mod factory;
pub mod iterable;
pub mod module;
pub mod store;
pub mod structure;
pub mod value;

pub use cell::{CALLABLE_ARGUMENT_MEMORY_INDEX, CALLABLE_RETURN_MEMORY_INDEX, CellKind, MemoryCell, MemoryIndex};
pub use constant::convert_constant;
pub use factory::{CallFactory, IterableFactory, MemoryFactory, StructureFactory};
pub use iterable::{SimpleIterable, SpliceNode};
pub use module::{ConstantValue, Module, ScriptContext, StoredConstantValue};
pub use store::{ConstantMemory, LocalMemory, MemoryAllocator, MemoryStore, module_constant_id};
pub use structure::{LayeredStructured, SimpleStructured};
pub use value::{
    CallableValue, EvaluatedValue, IterContext, IterRange, IterVisitor, IterableValue, MemoryValue,
    StructVisitor, StructuredValue,
};

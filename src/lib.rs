//! Cellvm - Embeddable virtual machine for typed cell graph scripts
//!
//! This crate re-exports all layers of the cellvm system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: cellvm_debug      - Tracing and recording debuggers
//!          cellvm_stdlib     - Standard native types and opcodes
//! Layer 2: cellvm_vm         - Opcodes, call compiler, engine, interpreter, loader
//! Layer 1: cellvm_memory     - Cells, lazy values, ropes, layered structures
//! Layer 0: cellvm_foundation - Problems, types, type registry and matcher
//! ```

pub use cellvm_debug as debug;
pub use cellvm_foundation as foundation;
pub use cellvm_memory as memory;
pub use cellvm_stdlib as stdlib;
pub use cellvm_vm as vm;

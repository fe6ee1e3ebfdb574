//! Standard native types and opcodes for the cellvm virtual machine.
//!
//! This crate provides:
//! - [`types`] - The `int`, `number` and `str` natives plus shared generics
//! - [`values`] - Reading and validating native opcode arguments
//! - [`numbers`] - `iadd`, `nadd`, and the folding `isum` / `nsum`
//! - [`strings`] - `concat`
//! - [`iterable`] - `peek` and `slice`
//! - [`structures`] - `kload`
//! - [`dynamic`] - `cload`, constant lookup by run-time names
//!
//! [`standard_opcodes`] and [`types::standard_types`] are meant to be handed
//! straight to [`cellvm_vm::create_script_loader`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::sync::Arc;

use cellvm_vm::Opcode;

pub mod dynamic;
pub mod iterable;
pub mod numbers;
pub mod strings;
pub mod structures;
pub mod types;
pub mod values;

pub use dynamic::{LoadConst, OPCODE_LOAD_CONST};
pub use iterable::{OPCODE_PEEK, OPCODE_SLICE, PeekIterable, SliceIterable};
pub use numbers::{
    AddIntegers, AddNumbers, OPCODE_ADD_INTEGERS, OPCODE_ADD_NUMBERS, OPCODE_SUM_INTEGERS, OPCODE_SUM_NUMBERS,
    SumIntegers, SumNumbers,
};
pub use strings::{ConcatStrings, OPCODE_CONCAT_STRINGS};
pub use structures::{GetKey, OPCODE_GET_KEY};
pub use types::{any_struct_type, integer_type, number_type, standard_types, string_type};

/// Every opcode in this crate.
#[must_use]
pub fn standard_opcodes() -> Vec<Arc<dyn Opcode>> {
    vec![
        Arc::new(AddIntegers::new()),
        Arc::new(AddNumbers::new()),
        Arc::new(SumIntegers::new()),
        Arc::new(SumNumbers::new()),
        Arc::new(ConcatStrings::new()),
        Arc::new(PeekIterable::new()),
        Arc::new(SliceIterable::new()),
        Arc::new(GetKey::new()),
        Arc::new(LoadConst::new()),
    ]
}

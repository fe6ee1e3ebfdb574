//! Foundation types for the cellvm virtual machine.
//!
//! This crate provides:
//! - [`Problem`] - Structured, coded diagnostics used for every failure
//! - [`SourcePosition`] - Positions in script source
//! - [`NativeValue`] - Host-level scalar values
//! - [`VmType`] / [`TypeRef`] - The five-category type model
//! - [`TypeRegistry`] - Named types and the structural type matcher

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod problem;
pub mod registry;
pub mod source;
pub mod types;
pub mod value;

pub use problem::{
    ParamValue, Parameters, Problem, ProblemFamily, ProblemId, Problems, Result,
    ValidationCollector, first_error_wins,
};
pub use registry::TypeRegistry;
pub use source::SourcePosition;
pub use types::{
    BindHint, CallableType, GenericRef, IterableType, KeyOfType, META_TYPE, META_TYPE_INTERNAL,
    META_TYPE_NAME, NativeType, NativeTypeCheck, RUNTIME_TYPE, RUNTIME_TYPE_INTERNAL,
    RUNTIME_TYPE_NAME, StructuredType, Termination, TypeCategory, TypeRef, VmType,
};
pub use value::NativeValue;

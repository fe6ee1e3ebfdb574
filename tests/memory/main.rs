//! Integration tests for Layer 1: Memory
//!
//! Tests for the rope, layered structures and constant memory.

mod constants;
mod ropes;
mod structures;

use std::sync::{Arc, LazyLock};

use cellvm_foundation::{NativeValue, VmType};
use cellvm_memory::{EvaluatedValue, MemoryCell, MemoryValue};

static INT: LazyLock<Arc<VmType>> =
    LazyLock::new(|| Arc::new(VmType::native("int", "integer", |v| matches!(v, NativeValue::Int(_)))));

static STR: LazyLock<Arc<VmType>> =
    LazyLock::new(|| Arc::new(VmType::native("str", "string", |v| matches!(v, NativeValue::Str(_)))));

pub fn int_type() -> Arc<VmType> {
    Arc::clone(&INT)
}

pub fn str_type() -> Arc<VmType> {
    Arc::clone(&STR)
}

/// An evaluated value outside any memory.
pub fn loose(value: impl Into<EvaluatedValue>, ty: Arc<VmType>) -> MemoryValue {
    MemoryValue::evaluated(None, Arc::new(MemoryCell::external("loose", ty)), value.into())
}

pub fn text(value: &MemoryValue) -> &str {
    value.value().and_then(EvaluatedValue::as_str).unwrap_or("<not a string>")
}

//! Integration tests for Layer 2: VM
//!
//! Tests for loading, compiling and running scripts.

mod errors;
mod loading;
mod running;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use cellvm_foundation::{NativeValue, Problem, ProblemId, SourcePosition, TypeRef, VmType};
use cellvm_memory::{CallableValue, ConstantValue, EvaluatedValue, MemoryCell, MemoryFactory, StoredConstantValue};
use cellvm_vm::{Opcode, OpcodeArgument, OpcodeFrame, OpcodeResult, OpcodeSignature};

static INT: LazyLock<Arc<VmType>> =
    LazyLock::new(|| Arc::new(VmType::native("int", "integer", |v| matches!(v, NativeValue::Int(_)))));

pub fn int_type() -> Arc<VmType> {
    Arc::clone(&INT)
}

/// `add a b` over plain integers.
#[derive(Debug)]
pub struct Add(OpcodeSignature);

impl Add {
    pub fn new() -> Self {
        Self(
            OpcodeSignature::new("add", SourcePosition::core("test.add"), int_type())
                .with_argument(OpcodeArgument::evaluated("a", int_type()))
                .with_argument(OpcodeArgument::evaluated("b", int_type())),
        )
    }
}

impl Opcode for Add {
    fn signature(&self) -> &OpcodeSignature {
        &self.0
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        match (
            frame.value(0).and_then(EvaluatedValue::as_int),
            frame.value(1).and_then(EvaluatedValue::as_int),
        ) {
            (Some(a), Some(b)) => OpcodeResult::Value(EvaluatedValue::from(a + b)),
            _ => frame.problem(ProblemId::ARGUMENT_VALUE).into(),
        }
    }
}

/// `boom tag`: always fails, naming its tag.
#[derive(Debug)]
pub struct Boom(OpcodeSignature);

impl Boom {
    pub fn new() -> Self {
        Self(
            OpcodeSignature::new("boom", SourcePosition::core("test.boom"), int_type())
                .with_argument(OpcodeArgument::evaluated("tag", int_type())),
        )
    }
}

impl Opcode for Boom {
    fn signature(&self) -> &OpcodeSignature {
        &self.0
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        let tag = frame.value(0).and_then(EvaluatedValue::as_int).unwrap_or(-1);
        OpcodeResult::Error(Problem::new(ProblemId::ARGUMENT_VALUE, None).with("tag", tag))
    }
}

pub fn opcodes() -> Vec<Arc<dyn Opcode>> {
    vec![Arc::new(Add::new()), Arc::new(Boom::new())]
}

/// A function taking no arguments and returning an int.
///
/// Cell 1 is the empty argument record.
pub fn thunk(mut cells: Vec<(usize, MemoryCell)>) -> ConstantValue {
    let no_args = Arc::new(VmType::structured("no-args", Vec::<(String, TypeRef)>::new()));
    cells.push((1, MemoryCell::external("arguments", Arc::clone(&no_args))));
    let ty = Arc::new(VmType::callable("thunk", no_args, int_type()));
    ConstantValue::new(ty, CallableValue::new(cells))
}

pub fn no_arguments() -> BTreeMap<String, StoredConstantValue> {
    BTreeMap::new()
}

//! Integer and number arithmetic.

use std::sync::Arc;

use cellvm_foundation::{Problem, ProblemId, SourcePosition, Termination, VmType};
use cellvm_memory::{EvaluatedValue, MemoryFactory};
use cellvm_vm::{Opcode, OpcodeArgument, OpcodeFrame, OpcodeResult, OpcodeSignature, ReducerValue};

use crate::types::{integer_type, number_type};
use crate::values::{
    memory_value_as_integer, memory_value_as_number, validate_memory_value_integer, validate_memory_value_number,
};

/// Mnemonic of [`AddIntegers`].
pub const OPCODE_ADD_INTEGERS: &str = "iadd";

/// Mnemonic of [`AddNumbers`].
pub const OPCODE_ADD_NUMBERS: &str = "nadd";

/// Mnemonic of [`SumIntegers`].
pub const OPCODE_SUM_INTEGERS: &str = "isum";

/// Mnemonic of [`SumNumbers`].
pub const OPCODE_SUM_NUMBERS: &str = "nsum";

fn binary(mnemonic: &str, source: &str, ty: &Arc<VmType>) -> OpcodeSignature {
    OpcodeSignature::new(mnemonic, SourcePosition::core(source), Arc::clone(ty))
        .with_argument(OpcodeArgument::evaluated("first", Arc::clone(ty)))
        .with_argument(OpcodeArgument::evaluated("second", Arc::clone(ty)))
}

fn both(
    check: fn(&OpcodeFrame<'_>, usize, bool) -> Option<Problem>,
    frame: &OpcodeFrame<'_>,
    requires_evaluation: bool,
) -> Vec<Problem> {
    [check(frame, 0, requires_evaluation), check(frame, 1, requires_evaluation)]
        .into_iter()
        .flatten()
        .collect()
}

// =============================================================================
// Addition
// =============================================================================

/// `iadd first second`: integer addition. Overflow wraps.
#[derive(Debug)]
pub struct AddIntegers {
    signature: OpcodeSignature,
}

impl AddIntegers {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: binary(OPCODE_ADD_INTEGERS, "core.integers.add", &integer_type()),
        }
    }
}

impl Default for AddIntegers {
    fn default() -> Self {
        Self::new()
    }
}

impl Opcode for AddIntegers {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn static_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        both(validate_memory_value_integer, frame, false)
    }

    fn runtime_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        both(validate_memory_value_integer, frame, true)
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        let first = frame.arg(0).and_then(memory_value_as_integer);
        let second = frame.arg(1).and_then(memory_value_as_integer);
        match (first, second) {
            (Some(a), Some(b)) => OpcodeResult::Value(EvaluatedValue::from(a.wrapping_add(b))),
            _ => first_problem(both(validate_memory_value_integer, frame, true), frame),
        }
    }
}

/// `nadd first second`: floating point addition.
#[derive(Debug)]
pub struct AddNumbers {
    signature: OpcodeSignature,
}

impl AddNumbers {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: binary(OPCODE_ADD_NUMBERS, "core.numbers.add", &number_type()),
        }
    }
}

impl Default for AddNumbers {
    fn default() -> Self {
        Self::new()
    }
}

impl Opcode for AddNumbers {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn static_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        both(validate_memory_value_number, frame, false)
    }

    fn runtime_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        both(validate_memory_value_number, frame, true)
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        let first = frame.arg(0).and_then(memory_value_as_number);
        let second = frame.arg(1).and_then(memory_value_as_number);
        match (first, second) {
            (Some(a), Some(b)) => OpcodeResult::Value(EvaluatedValue::from(a + b)),
            _ => first_problem(both(validate_memory_value_number, frame, true), frame),
        }
    }
}

/// Evaluation without runtime validation can still meet bad arguments.
fn first_problem(problems: Vec<Problem>, frame: &OpcodeFrame<'_>) -> OpcodeResult {
    problems
        .into_iter()
        .next()
        .unwrap_or_else(|| frame.problem(ProblemId::ARGUMENT_VALUE))
        .into()
}

// =============================================================================
// Sums
// =============================================================================

fn sum_signature(mnemonic: &str, source: &str, element: &Arc<VmType>) -> OpcodeSignature {
    let items = VmType::iterable(format!("finite-{}-list", element.name()), Arc::clone(element))
        .with_termination(Termination::Finite)
        .with_source(SourcePosition::core(source));
    OpcodeSignature::new(mnemonic, SourcePosition::core(source), Arc::clone(element))
        .with_argument(OpcodeArgument::lazy("items", items))
        .with_argument(OpcodeArgument::lazy("initial", Arc::clone(element)))
}

fn sum(frame: &OpcodeFrame<'_>, adding: &str) -> OpcodeResult {
    match (frame.arg(0), frame.arg(1)) {
        (Some(items), Some(initial)) => OpcodeResult::Reduce(ReducerValue::Opcode {
            opcode: adding.to_string(),
            context: None,
            iterable: items.clone(),
            initial: initial.clone(),
        }),
        _ => frame
            .problem(ProblemId::ARGUMENT_COUNT)
            .with("expected", 2_usize)
            .with("actual", frame.args.len())
            .into(),
    }
}

/// `isum items initial`: folds a finite list of integers with `iadd`.
#[derive(Debug)]
pub struct SumIntegers {
    signature: OpcodeSignature,
}

impl SumIntegers {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: sum_signature(OPCODE_SUM_INTEGERS, "core.integers.sum", &integer_type()),
        }
    }
}

impl Default for SumIntegers {
    fn default() -> Self {
        Self::new()
    }
}

impl Opcode for SumIntegers {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        sum(frame, OPCODE_ADD_INTEGERS)
    }
}

/// `nsum items initial`: folds a finite list of numbers with `nadd`.
#[derive(Debug)]
pub struct SumNumbers {
    signature: OpcodeSignature,
}

impl SumNumbers {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: sum_signature(OPCODE_SUM_NUMBERS, "core.numbers.sum", &number_type()),
        }
    }
}

impl Default for SumNumbers {
    fn default() -> Self {
        Self::new()
    }
}

impl Opcode for SumNumbers {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        sum(frame, OPCODE_ADD_NUMBERS)
    }
}

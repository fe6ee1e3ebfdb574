//! Reading and checking native opcode arguments.
//!
//! The `validate_*` functions are meant for `static_validation` (with
//! `requires_evaluation` false, since only constant arguments are known at
//! load time) and `runtime_validation` (with it true). Once an argument
//! passed validation, the `memory_value_as_*` readers cannot fail.

use cellvm_foundation::{Problem, ProblemId, VmType};
use cellvm_memory::{EvaluatedValue, MemoryValue};
use cellvm_vm::OpcodeFrame;

use crate::types::{integer_type, number_type, string_type};

/// The integer held by an evaluated value.
#[must_use]
pub fn memory_value_as_integer(value: &MemoryValue) -> Option<i64> {
    value.value().and_then(EvaluatedValue::as_int)
}

/// The number held by an evaluated value.
#[must_use]
pub fn memory_value_as_number(value: &MemoryValue) -> Option<f64> {
    value.value().and_then(EvaluatedValue::as_number)
}

/// The string held by an evaluated value.
#[must_use]
pub fn memory_value_as_string(value: &MemoryValue) -> Option<&str> {
    value.value().and_then(EvaluatedValue::as_str)
}

/// Checks that argument `index` is an integer.
#[must_use]
pub fn validate_memory_value_integer(
    frame: &OpcodeFrame<'_>,
    index: usize,
    requires_evaluation: bool,
) -> Option<Problem> {
    validate_native(frame, index, requires_evaluation, &integer_type())
}

/// Checks that argument `index` is a number.
#[must_use]
pub fn validate_memory_value_number(
    frame: &OpcodeFrame<'_>,
    index: usize,
    requires_evaluation: bool,
) -> Option<Problem> {
    validate_native(frame, index, requires_evaluation, &number_type())
}

/// Checks that argument `index` is a string.
#[must_use]
pub fn validate_memory_value_string(
    frame: &OpcodeFrame<'_>,
    index: usize,
    requires_evaluation: bool,
) -> Option<Problem> {
    validate_native(frame, index, requires_evaluation, &string_type())
}

/// A cell of a runtime-determined type is accepted when its value checks out.
fn validate_native(
    frame: &OpcodeFrame<'_>,
    index: usize,
    requires_evaluation: bool,
    expected: &VmType,
) -> Option<Problem> {
    let Some(expected_native) = expected.as_native() else {
        return Some(frame.problem(ProblemId::UNKNOWN_PRIMARY_TYPE).with("type", expected.name()));
    };
    let Some(arg) = frame.arg(index) else {
        return Some(
            frame
                .problem(ProblemId::ARGUMENT_COUNT)
                .with("index", index)
                .with("actual", frame.args.len()),
        );
    };
    let confusion = || {
        frame
            .problem(ProblemId::TYPE_CONFUSION)
            .with("index", index)
            .with("expected", expected.name())
            .with("actual", arg.ty().name())
    };

    let declared_ok = arg.ty().is_runtime_determined()
        || arg
            .ty()
            .as_native()
            .is_some_and(|n| n.internal_type == expected_native.internal_type);
    if !declared_ok {
        return Some(confusion());
    }
    match arg.value() {
        None if requires_evaluation => {
            Some(frame.problem(ProblemId::NON_EVALUATED_VALUE).with("index", index))
        }
        None => None,
        Some(value) => {
            let holds = value.as_native().is_some_and(|v| (expected_native.is_type)(v));
            (!holds).then(confusion)
        }
    }
}

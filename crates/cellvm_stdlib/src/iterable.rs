//! Iterable access.

use cellvm_foundation::{BindHint, Problem, ProblemId, SourcePosition};
use cellvm_memory::{EvaluatedValue, IterRange, MemoryFactory};
use cellvm_vm::{GenericBinding, Opcode, OpcodeArgument, OpcodeFrame, OpcodeResult, OpcodeSignature};

use crate::types::{generic_t, integer_type, iterable_of_t};
use crate::values::{memory_value_as_integer, validate_memory_value_integer};

/// Mnemonic of [`PeekIterable`].
pub const OPCODE_PEEK: &str = "peek";

/// Mnemonic of [`SliceIterable`].
pub const OPCODE_SLICE: &str = "slice";

/// `peek iterable default`: the first element, or `default` when empty.
///
/// `default` is lazy and only evaluated for an empty iterable.
#[derive(Debug)]
pub struct PeekIterable {
    signature: OpcodeSignature,
}

impl PeekIterable {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: OpcodeSignature::new(OPCODE_PEEK, SourcePosition::core("core.iterable.peek"), generic_t())
                .with_generic(GenericBinding::new("T", BindHint::Any))
                .with_argument(OpcodeArgument::shallow("iterable", iterable_of_t()))
                .with_argument(OpcodeArgument::lazy("default", generic_t())),
        }
    }
}

impl Default for PeekIterable {
    fn default() -> Self {
        Self::new()
    }
}

impl Opcode for PeekIterable {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        let Some(items) = frame.value(0).and_then(EvaluatedValue::as_iterable) else {
            return not_iterable(frame);
        };
        match items.get(0).or_else(|| frame.arg(1).cloned()) {
            Some(first) => OpcodeResult::Lazy(first),
            None => frame.problem(ProblemId::ARGUMENT_COUNT).into(),
        }
    }
}

/// `slice iterable start end`: elements `[start, end)`.
///
/// A negative `end` counts from the end of the iterable. A range reaching
/// past the end is cut short rather than rejected.
#[derive(Debug)]
pub struct SliceIterable {
    signature: OpcodeSignature,
}

impl SliceIterable {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: OpcodeSignature::new(
                OPCODE_SLICE,
                SourcePosition::core("core.iterable.slice"),
                iterable_of_t(),
            )
            .with_generic(GenericBinding::new("T", BindHint::Any))
            .with_argument(OpcodeArgument::shallow("iterable", iterable_of_t()))
            .with_argument(OpcodeArgument::evaluated("start", integer_type()))
            .with_argument(OpcodeArgument::evaluated("end", integer_type())),
        }
    }

    fn check(frame: &OpcodeFrame<'_>, requires_evaluation: bool) -> Vec<Problem> {
        let mut problems: Vec<Problem> = (1..3)
            .filter_map(|i| validate_memory_value_integer(frame, i, requires_evaluation))
            .collect();
        if !problems.is_empty() {
            return problems;
        }
        let start = frame.arg(1).and_then(memory_value_as_integer);
        let end = frame.arg(2).and_then(memory_value_as_integer);
        if let Some(start) = start.filter(|s| *s < 0) {
            problems.push(
                frame
                    .problem(ProblemId::ARGUMENT_VALUE)
                    .with("value", start)
                    .with("reason", "start cannot be negative"),
            );
        }
        if let (Some(start), Some(end)) = (start, end) {
            if end >= 0 && end < start {
                problems.push(
                    frame
                        .problem(ProblemId::ARGUMENT_VALUE)
                        .with("value", end)
                        .with("reason", "end is before start"),
                );
            }
        }
        problems
    }
}

impl Default for SliceIterable {
    fn default() -> Self {
        Self::new()
    }
}

impl Opcode for SliceIterable {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn static_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        Self::check(frame, false)
    }

    fn runtime_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        Self::check(frame, true)
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, factory: &MemoryFactory<'_>) -> OpcodeResult {
        let (Some(list), Some(items)) = (frame.arg(0), frame.value(0).and_then(EvaluatedValue::as_iterable)) else {
            return not_iterable(frame);
        };
        let start = frame.arg(1).and_then(memory_value_as_integer).and_then(|s| usize::try_from(s).ok());
        let end = frame.arg(2).and_then(memory_value_as_integer).and_then(|e| isize::try_from(e).ok());
        let (Some(start), Some(end)) = (start, end) else {
            return Self::check(frame, true)
                .into_iter()
                .next()
                .unwrap_or_else(|| frame.problem(ProblemId::ARGUMENT_VALUE))
                .into();
        };
        match IterRange::new(start, end).resolve(items.size()) {
            Some((from, to)) => factory.iterable().sub(list, from, to).into(),
            None => OpcodeResult::Value(factory.iterable().from_memory(Vec::new())),
        }
    }
}

fn not_iterable(frame: &OpcodeFrame<'_>) -> OpcodeResult {
    let actual = frame.arg(0).map_or("missing", |a| a.ty().name());
    frame
        .problem(ProblemId::WRONG_VALUE_TYPE)
        .with("index", 0_usize)
        .with("expected", "iterable")
        .with("actual", actual)
        .into()
}

//! String operations.

use cellvm_foundation::{Problem, ProblemId, SourcePosition};
use cellvm_memory::{EvaluatedValue, MemoryFactory};
use cellvm_vm::{Opcode, OpcodeArgument, OpcodeFrame, OpcodeResult, OpcodeSignature};

use crate::types::string_type;
use crate::values::{memory_value_as_string, validate_memory_value_string};

/// Mnemonic of [`ConcatStrings`].
pub const OPCODE_CONCAT_STRINGS: &str = "concat";

/// `concat first second`: joins two strings.
#[derive(Debug)]
pub struct ConcatStrings {
    signature: OpcodeSignature,
}

impl ConcatStrings {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: OpcodeSignature::new(
                OPCODE_CONCAT_STRINGS,
                SourcePosition::core("core.strings.concat"),
                string_type(),
            )
            .with_argument(OpcodeArgument::evaluated("first", string_type()))
            .with_argument(OpcodeArgument::evaluated("second", string_type())),
        }
    }
}

impl Default for ConcatStrings {
    fn default() -> Self {
        Self::new()
    }
}

impl Opcode for ConcatStrings {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn static_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        (0..2).filter_map(|i| validate_memory_value_string(frame, i, false)).collect()
    }

    fn runtime_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        (0..2).filter_map(|i| validate_memory_value_string(frame, i, true)).collect()
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        let first = frame.arg(0).and_then(memory_value_as_string);
        let second = frame.arg(1).and_then(memory_value_as_string);
        match (first, second) {
            (Some(a), Some(b)) => OpcodeResult::Value(EvaluatedValue::from(format!("{a}{b}").as_str())),
            _ => (0..2)
                .find_map(|i| validate_memory_value_string(frame, i, true))
                .unwrap_or_else(|| frame.problem(ProblemId::ARGUMENT_VALUE))
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use crate::types::integer_type;

    #[test]
    fn joins() {
        let h = Harness::new();
        let frame = h.frame(vec![h.string("cell"), h.string("vm")], string_type());
        let value = h.evaluate(&ConcatStrings::new(), &frame).unwrap();
        assert_eq!(value.as_str(), Some("cellvm"));
    }

    #[test]
    fn reports_each_bad_argument() {
        let h = Harness::new();
        let frame = h.frame(vec![h.int(1), h.int(2)], string_type());
        let problems = ConcatStrings::new().runtime_validation(&frame);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.id == ProblemId::TYPE_CONFUSION));

        let frame = h.frame(vec![h.pending(string_type()), h.pending(integer_type())], string_type());
        let problems = ConcatStrings::new().static_validation(&frame);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].param_num("index"), Some(1.0));
    }
}

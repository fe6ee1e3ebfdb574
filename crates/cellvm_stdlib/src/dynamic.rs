//! Constant lookup by run-time names.

use std::sync::Arc;

use cellvm_foundation::{Problem, ProblemId, RUNTIME_TYPE, SourcePosition};
use cellvm_memory::{ConstantValue, MemoryFactory, Module};
use cellvm_vm::{Opcode, OpcodeArgument, OpcodeFrame, OpcodeResult, OpcodeSignature};
use tracing::trace;

use crate::types::string_type;
use crate::values::{memory_value_as_string, validate_memory_value_string};

/// Mnemonic of [`LoadConst`].
pub const OPCODE_LOAD_CONST: &str = "cload";

/// `cload module-name constant-name`: a module constant chosen at run time.
///
/// The return type is runtime-determined, so the compiler cannot check it.
/// The lookup checks the constant's type against the receiving cell
/// instead, at load time when both names are constants and otherwise
/// before evaluation.
#[derive(Debug)]
pub struct LoadConst {
    signature: OpcodeSignature,
}

impl LoadConst {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: OpcodeSignature::new(
                OPCODE_LOAD_CONST,
                SourcePosition::core("core.const-lookup"),
                Arc::clone(&RUNTIME_TYPE),
            )
            .with_argument(OpcodeArgument::evaluated("module-name", string_type()))
            .with_argument(OpcodeArgument::evaluated("constant-name", string_type())),
        }
    }
}

impl Default for LoadConst {
    fn default() -> Self {
        Self::new()
    }
}

fn module_of<'a>(frame: &OpcodeFrame<'a>, module: &str) -> Result<&'a Module, Problem> {
    frame.context.modules.get(module).ok_or_else(|| {
        frame
            .problem(ProblemId::MODULE_NOT_FOUND)
            .with("module", module)
    })
}

/// Finds the constant and checks it fits the receiving cell.
fn constant_of<'a>(frame: &OpcodeFrame<'a>, module: &str, constant: &str) -> Result<&'a ConstantValue, Problem> {
    let found = module_of(frame, module)?.constants.get(constant).ok_or_else(|| {
        frame
            .problem(ProblemId::CONST_NOT_FOUND)
            .with("module", module)
            .with("constant", constant)
    })?;
    if !frame.return_type.is_runtime_determined() {
        frame
            .context
            .types
            .enforce_type_match(frame.source.as_ref(), &found.ty, Some(&*frame.return_type))
            .map_err(|p| p.augment("module", module).augment("constant", constant))?;
    }
    Ok(found)
}

fn names<'f>(frame: &'f OpcodeFrame<'_>) -> Option<(&'f str, &'f str)> {
    Some((
        frame.arg(0).and_then(memory_value_as_string)?,
        frame.arg(1).and_then(memory_value_as_string)?,
    ))
}

impl Opcode for LoadConst {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn static_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        let known = (frame.value(0).is_some(), frame.value(1).is_some());
        match known {
            (true, true) => self.runtime_validation(frame),
            (true, false) => {
                if let Some(problem) = validate_memory_value_string(frame, 0, true) {
                    return vec![problem];
                }
                frame
                    .arg(0)
                    .and_then(memory_value_as_string)
                    .and_then(|module| module_of(frame, module).err())
                    .into_iter()
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn runtime_validation(&self, frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        let problems: Vec<Problem> = (0..2)
            .filter_map(|i| validate_memory_value_string(frame, i, true))
            .collect();
        if !problems.is_empty() {
            return problems;
        }
        match names(frame) {
            Some((module, constant)) => constant_of(frame, module, constant).err().into_iter().collect(),
            None => vec![frame.problem(ProblemId::NON_EVALUATED_VALUE)],
        }
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, factory: &MemoryFactory<'_>) -> OpcodeResult {
        let Some((module, constant)) = names(frame) else {
            return self
                .runtime_validation(frame)
                .into_iter()
                .next()
                .unwrap_or_else(|| frame.problem(ProblemId::NON_EVALUATED_VALUE))
                .into();
        };
        if let Err(problem) = constant_of(frame, module, constant) {
            return problem.into();
        }
        trace!(module, constant, "dynamic constant lookup");
        let constants = factory.memory().parent();
        match constants.lookup(module, constant).and_then(|i| constants.get(i)) {
            Some(value) => OpcodeResult::Lazy(value.clone()),
            None => frame
                .problem(ProblemId::CONST_NOT_FOUND)
                .with("module", module)
                .with("constant", constant)
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use crate::types::integer_type;
    use crate::values::memory_value_as_integer;

    fn harness() -> Harness {
        Harness::with_modules(vec![
            Module::new("m").with_constant("answer", ConstantValue::new(integer_type(), 42_i64)),
        ])
    }

    #[test]
    fn loads_named_constants() {
        let h = harness();
        let frame = h.frame(vec![h.string("m"), h.string("answer")], integer_type());
        let op = LoadConst::new();
        assert!(op.static_validation(&frame).is_empty());
        match op.evaluate(&frame, &h.factory()) {
            OpcodeResult::Lazy(value) => assert_eq!(memory_value_as_integer(&value), Some(42)),
            other => panic!("expected a lazy value, got {other:?}"),
        }
    }

    #[test]
    fn reports_missing_names() {
        let h = harness();
        let op = LoadConst::new();

        let frame = h.frame(vec![h.string("nope"), h.pending(string_type())], integer_type());
        let problems = op.static_validation(&frame);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].id, ProblemId::MODULE_NOT_FOUND);
        assert_eq!(problems[0].param_str("module"), Some("nope"));

        let frame = h.frame(vec![h.string("m"), h.string("question")], integer_type());
        let problem = h.evaluate(&op, &frame).unwrap_err();
        assert_eq!(problem.id, ProblemId::CONST_NOT_FOUND);
        assert_eq!(problem.param_str("constant"), Some("question"));
    }

    #[test]
    fn checks_the_receiving_type() {
        let h = harness();
        let frame = h.frame(vec![h.string("m"), h.string("answer")], string_type());
        let problems = LoadConst::new().runtime_validation(&frame);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].param_str("constant"), Some("answer"));
    }

    #[test]
    fn unknown_names_are_not_checked_at_load() {
        let h = harness();
        let frame = h.frame(vec![h.pending(string_type()), h.pending(string_type())], integer_type());
        assert!(LoadConst::new().static_validation(&frame).is_empty());
    }
}

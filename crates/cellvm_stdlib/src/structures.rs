//! Structure access.

use cellvm_foundation::{BindHint, ProblemId, SourcePosition};
use cellvm_memory::{EvaluatedValue, MemoryFactory};
use cellvm_vm::{GenericBinding, Opcode, OpcodeArgument, OpcodeFrame, OpcodeResult, OpcodeSignature};

use crate::types::{generic_r, generic_s, key_of_s};

/// Mnemonic of [`GetKey`].
pub const OPCODE_GET_KEY: &str = "kload";

/// `kload structure key`: the member stored under `key`.
///
/// The result type `R` is bound from the structure's declared member type
/// when the key is a constant.
#[derive(Debug)]
pub struct GetKey {
    signature: OpcodeSignature,
}

impl GetKey {
    /// Creates the opcode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: OpcodeSignature::new(OPCODE_GET_KEY, SourcePosition::core("core.structures"), generic_r())
                .with_generic(GenericBinding::new("S", BindHint::Structure))
                .with_generic(GenericBinding::new("R", BindHint::Any).keyed_by(1))
                .with_argument(OpcodeArgument::shallow("structure", generic_s()))
                .with_argument(OpcodeArgument::evaluated("key", key_of_s())),
        }
    }
}

impl Default for GetKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Opcode for GetKey {
    fn signature(&self) -> &OpcodeSignature {
        &self.signature
    }

    fn evaluate(&self, frame: &OpcodeFrame<'_>, _factory: &MemoryFactory<'_>) -> OpcodeResult {
        let Some(structure) = frame.value(0).and_then(EvaluatedValue::as_structured) else {
            let actual = frame.arg(0).map_or("missing", |a| a.ty().name());
            return frame
                .problem(ProblemId::WRONG_VALUE_TYPE)
                .with("index", 0_usize)
                .with("expected", "structured")
                .with("actual", actual)
                .into();
        };
        let Some(key) = frame.value(1).and_then(|v| v.as_key().or_else(|| v.as_str())) else {
            return frame
                .problem(ProblemId::TYPE_CONFUSION)
                .with("index", 1_usize)
                .with("expected", "keyof")
                .into();
        };
        match structure.get(key) {
            Some(member) => OpcodeResult::Lazy(member),
            None => frame
                .problem(ProblemId::ARGUMENT_VALUE)
                .with("key", key)
                .with("reason", "no such key")
                .into(),
        }
    }
}

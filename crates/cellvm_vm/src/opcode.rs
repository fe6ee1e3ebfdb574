//! The opcode contract implemented by embedding systems.
//!
//! An opcode declares a signature (arguments, generics, and return type) and
//! a validate/evaluate lifecycle:
//!
//! 1. `static_validation` runs once at load time for every call site. Only
//!    arguments that come from constants carry values.
//! 2. `runtime_validation` runs before each evaluation, with every argument
//!    evaluated as its [`EvaluationKind`] requires.
//! 3. `evaluate` produces an [`OpcodeResult`].
//! 4. `return_validation` optionally checks generated values.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cellvm_foundation::{BindHint, Problem, ProblemId, SourcePosition, TypeRef, VmType};
use cellvm_memory::{EvaluatedValue, MemoryFactory, MemoryValue, ScriptContext};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Types bound to an opcode's generics at one call site, by generic id.
pub type BoundTypes = BTreeMap<String, Arc<VmType>>;

/// Opcodes by mnemonic.
pub type OpcodeTable = BTreeMap<String, Arc<dyn Opcode>>;

// =============================================================================
// Signature
// =============================================================================

/// How far an argument is evaluated before the opcode sees it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EvaluationKind {
    /// The value and, for iterables and structures, every element.
    #[default]
    Evaluated,
    /// Nothing; the opcode may return the value lazily or ignore it.
    Lazy,
    /// The value itself but not its elements.
    ShallowEvaluation,
}

impl EvaluationKind {
    /// Lowercase name for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evaluated => "evaluated",
            Self::Lazy => "lazy",
            Self::ShallowEvaluation => "shallow_evaluation",
        }
    }
}

/// One declared argument.
#[derive(Clone, Debug)]
pub struct OpcodeArgument {
    /// Name for diagnostics.
    pub name: Option<String>,
    /// Declared type; may be generic.
    pub ty: TypeRef,
    /// Required evaluation state.
    pub evaluation: EvaluationKind,
}

impl OpcodeArgument {
    /// Creates an argument.
    #[must_use]
    pub fn new(name: &str, ty: impl Into<TypeRef>, evaluation: EvaluationKind) -> Self {
        Self {
            name: Some(name.to_string()),
            ty: ty.into(),
            evaluation,
        }
    }

    /// A fully evaluated argument.
    #[must_use]
    pub fn evaluated(name: &str, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, ty, EvaluationKind::Evaluated)
    }

    /// A lazy argument.
    #[must_use]
    pub fn lazy(name: &str, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, ty, EvaluationKind::Lazy)
    }

    /// A shallowly evaluated argument.
    #[must_use]
    pub fn shallow(name: &str, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, ty, EvaluationKind::ShallowEvaluation)
    }

    /// The name, or `<unset>`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unset>")
    }
}

/// How one generic is bound at a call site.
///
/// Without an index, the generic is bound from the types of the arguments
/// declared with it. At most one index may be set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericBinding {
    /// Generic id referenced by the signature.
    pub id: String,
    /// Required category of the bound type.
    pub hint: BindHint,
    /// Argument holding a meta-type value to bind to.
    pub from_argument_index: Option<usize>,
    /// Key-of argument whose key selects the bound type from its structure.
    pub keyed_type_argument_index: Option<usize>,
}

impl GenericBinding {
    /// A generic bound from argument types.
    #[must_use]
    pub fn new(id: &str, hint: BindHint) -> Self {
        Self {
            id: id.to_string(),
            hint,
            from_argument_index: None,
            keyed_type_argument_index: None,
        }
    }

    /// Binds from a meta-type argument.
    #[must_use]
    pub const fn from_argument(mut self, index: usize) -> Self {
        self.from_argument_index = Some(index);
        self
    }

    /// Binds from the structure member a key argument names.
    #[must_use]
    pub const fn keyed_by(mut self, index: usize) -> Self {
        self.keyed_type_argument_index = Some(index);
        self
    }
}

/// The declared shape of an opcode.
#[derive(Clone, Debug)]
pub struct OpcodeSignature {
    /// Where the opcode was defined.
    pub source: SourcePosition,
    /// Unique mnemonic used by opcode cells.
    pub mnemonic: String,
    /// Generic bindings.
    pub generics: Vec<GenericBinding>,
    /// Ordered arguments.
    pub arguments: Vec<OpcodeArgument>,
    /// Return type; may be generic.
    pub return_type: TypeRef,
}

impl OpcodeSignature {
    /// A signature with no arguments or generics.
    #[must_use]
    pub fn new(mnemonic: &str, source: SourcePosition, return_type: impl Into<TypeRef>) -> Self {
        Self {
            source,
            mnemonic: mnemonic.to_string(),
            generics: Vec::new(),
            arguments: Vec::new(),
            return_type: return_type.into(),
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_argument(mut self, argument: OpcodeArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Adds a generic binding.
    #[must_use]
    pub fn with_generic(mut self, binding: GenericBinding) -> Self {
        self.generics.push(binding);
        self
    }

    /// The binding for a generic id.
    #[must_use]
    pub fn generic(&self, id: &str) -> Option<&GenericBinding> {
        self.generics.iter().find(|g| g.id == id)
    }
}

// =============================================================================
// Frames and results
// =============================================================================

/// One invocation of an opcode, at load time or at run time.
pub struct OpcodeFrame<'a> {
    /// Source of the opcode cell.
    pub source: Option<SourcePosition>,
    /// The loaded script.
    pub context: &'a ScriptContext,
    /// Ordered arguments. At load time only constant arguments are evaluated.
    pub args: Vec<MemoryValue>,
    /// Declared type of the cell receiving the result.
    pub return_type: Arc<VmType>,
    /// Types bound to the opcode's generics.
    pub bound_types: BoundTypes,
}

impl OpcodeFrame<'_> {
    /// Argument at an index.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&MemoryValue> {
        self.args.get(index)
    }

    /// Evaluated value of an argument, if present.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&EvaluatedValue> {
        self.args.get(index).and_then(MemoryValue::value)
    }

    /// Type bound to a generic.
    #[must_use]
    pub fn bound(&self, id: &str) -> Option<&Arc<VmType>> {
        self.bound_types.get(id)
    }

    /// A problem located at this frame.
    #[must_use]
    pub fn problem(&self, id: ProblemId) -> Problem {
        Problem::new(id, self.source.clone())
    }
}

impl fmt::Debug for OpcodeFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeFrame")
            .field("source", &self.source)
            .field("args", &self.args)
            .field("return_type", &self.return_type.name())
            .field("bound_types", &self.bound_types.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A request to fold an iterable with an associative operation.
///
/// The fold keeps element order but may regroup terms, so the operation
/// must be associative. This is not checked.
#[derive(Clone, Debug)]
pub enum ReducerValue {
    /// Fold with an opcode taking `(accumulated, next)` and, if given,
    /// the context as a third argument.
    Opcode {
        /// Mnemonic of the combining opcode.
        opcode: String,
        /// Extra argument passed to every combination.
        context: Option<MemoryValue>,
        /// The values to fold.
        iterable: MemoryValue,
        /// The starting value; the result for an empty iterable.
        initial: MemoryValue,
    },
    /// Fold with a script function taking a structure argument.
    Function {
        /// The callable.
        function: MemoryValue,
        /// Argument key receiving the accumulated value.
        first_key: String,
        /// Argument key receiving the next value.
        second_key: String,
        /// Argument key receiving the context, if any.
        context_key: Option<String>,
        /// Value for `context_key`.
        context: Option<MemoryValue>,
        /// The values to fold.
        iterable: MemoryValue,
        /// The starting value; the result for an empty iterable.
        initial: MemoryValue,
    },
}

/// What an opcode evaluation produced.
#[derive(Clone, Debug)]
pub enum OpcodeResult {
    /// A finished value.
    Value(EvaluatedValue),
    /// A runtime error.
    Error(Problem),
    /// Another memory value whose value becomes the result.
    Lazy(MemoryValue),
    /// A fold to perform.
    Reduce(ReducerValue),
}

impl From<EvaluatedValue> for OpcodeResult {
    fn from(value: EvaluatedValue) -> Self {
        Self::Value(value)
    }
}

impl From<Problem> for OpcodeResult {
    fn from(problem: Problem) -> Self {
        Self::Error(problem)
    }
}

impl<E: Into<Problem>> From<Result<EvaluatedValue, E>> for OpcodeResult {
    fn from(result: Result<EvaluatedValue, E>) -> Self {
        match result {
            Ok(v) => Self::Value(v),
            Err(p) => Self::Error(p.into()),
        }
    }
}

// =============================================================================
// Opcode trait
// =============================================================================

/// An operation supplied by the embedding system.
pub trait Opcode: Send + Sync {
    /// The declared signature.
    fn signature(&self) -> &OpcodeSignature;

    /// The mnemonic.
    fn mnemonic(&self) -> &str {
        &self.signature().mnemonic
    }

    /// Load-time checks beyond argument count and types.
    fn static_validation(&self, _frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        Vec::new()
    }

    /// Run-time checks made before `evaluate`.
    fn runtime_validation(&self, _frame: &OpcodeFrame<'_>) -> Vec<Problem> {
        Vec::new()
    }

    /// Produces the result. May assume `runtime_validation` passed.
    fn evaluate(&self, frame: &OpcodeFrame<'_>, factory: &MemoryFactory<'_>) -> OpcodeResult;

    /// Checks a generated value.
    fn return_validation(&self, _frame: &OpcodeFrame<'_>, _value: &EvaluatedValue) -> Vec<Problem> {
        Vec::new()
    }
}

impl fmt::Debug for dyn Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opcode({})", self.mnemonic())
    }
}

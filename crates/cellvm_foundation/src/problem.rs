//! Problems: the single record shape for load-time validation issues and
//! runtime errors.
//!
//! Uses `thiserror` so problems compose with `?` and `std::error::Error`.
//! Identifiers are stable numeric codes grouped into families; see
//! [`ProblemId`].

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::SourcePosition;

// =============================================================================
// Problem Identifiers
// =============================================================================

const VM_ERROR: u32 = 0x10_0000;
const VM_MEMORY: u32 = 0x1_0000 | VM_ERROR;
const VM_EXECUTION: u32 = 0x2_0000 | VM_ERROR;
const VM_BUG: u32 = 0xf_0000 | VM_ERROR;

const USER_ERROR: u32 = 0x20_0000;
const USER_RUNTIME: u32 = 0x1_0000 | USER_ERROR;

const IMPL_ERROR: u32 = 0x40_0000;
const IMPL_DECLARATION: u32 = 0x1_0000 | IMPL_ERROR;

const VALIDATION: u32 = 0x80_0000;
const VALIDATION_OPCODE: u32 = 0x1_0000 | VALIDATION;

const FAMILY_MASK: u32 = 0xf0_0000;
const CATEGORY_MASK: u32 = 0xff_0000;

/// Stable numeric problem code.
///
/// The top nibble of the 24-bit code names the family (VM, user,
/// implementation, validation); the next nibble the category inside it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProblemId(pub u32);

/// The family a [`ProblemId`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemFamily {
    /// Memory, execution, or internal-bug failures inside the VM.
    Vm,
    /// Malformed or inconsistent script content.
    User,
    /// Faulty declarations from the embedding system.
    Implementation,
    /// Opcode argument validation failures.
    Validation,
    /// Not a known family.
    Unknown,
}

impl ProblemId {
    // === VM: memory ===
    /// Memory graph is malformed (dangling or cyclic references).
    pub const STRUCTURE_CORRUPT: Self = Self(1 | VM_MEMORY);
    /// A value was not of the type its cell declared.
    pub const TYPE_CONFUSION: Self = Self(2 | VM_MEMORY);

    // === VM: execution ===
    /// An action ran before its dependencies resolved.
    pub const INSTRUCTION_ORDER_VIOLATION: Self = Self(1 | VM_EXECUTION);
    /// Execution was cancelled through its cancellation token.
    pub const CANCELLED: Self = Self(2 | VM_EXECUTION);
    /// Execution exceeded the configured step budget.
    pub const STEP_LIMIT_EXCEEDED: Self = Self(3 | VM_EXECUTION);

    // === VM: bugs ===
    /// A type was of no known category.
    pub const UNKNOWN_PRIMARY_TYPE: Self = Self(1 | VM_BUG);
    /// A value was used before it was evaluated.
    pub const NON_EVALUATED_VALUE: Self = Self(2 | VM_BUG);
    /// A spliced iterable was asked for an impossible range.
    pub const BAD_SPLICE_RANGE: Self = Self(3 | VM_BUG);

    // === User: runtime ===
    /// A module name did not resolve.
    pub const MODULE_NOT_FOUND: Self = Self(1 | USER_RUNTIME);
    /// A constant name did not resolve inside its module.
    pub const CONST_NOT_FOUND: Self = Self(2 | USER_RUNTIME);
    /// Two types were not compatible.
    pub const TYPE_MISMATCH: Self = Self(3 | USER_RUNTIME);
    /// A type name was not registered.
    pub const UNKNOWN_TYPE: Self = Self(4 | USER_RUNTIME);
    /// An index was outside of an iterable.
    pub const INDEX_OUT_OF_RANGE: Self = Self(5 | USER_RUNTIME);

    // === Implementation: declarations ===
    /// A type name was registered twice with different definitions.
    pub const DUPLICATE_TYPE: Self = Self(1 | IMPL_DECLARATION);
    /// An opcode mnemonic was declared more than once.
    pub const DUPLICATE_OPCODES: Self = Self(2 | IMPL_DECLARATION);
    /// A module name was loaded more than once.
    pub const DUPLICATE_MODULE_NAMES: Self = Self(3 | IMPL_DECLARATION);
    /// A generic appears deeper than the allowed nesting.
    pub const GENERIC_BINDING_DEEP: Self = Self(4 | IMPL_DECLARATION);
    /// A generic binding references an argument index out of range.
    pub const GENERIC_BINDING_INDEX: Self = Self(5 | IMPL_DECLARATION);
    /// A generic binding sets both the from and keyed argument index.
    pub const GENERIC_BINDING_STATE: Self = Self(6 | IMPL_DECLARATION);
    /// A from-argument binding does not reference a meta-type argument.
    pub const GENERIC_BINDING_FROM_TYPE: Self = Self(7 | IMPL_DECLARATION);
    /// A keyed binding does not reference a key-of argument.
    pub const GENERIC_BINDING_KEYED_TYPE: Self = Self(8 | IMPL_DECLARATION);
    /// A generic id was declared twice on one opcode.
    pub const DUPLICATE_GENERIC_BINDING: Self = Self(9 | IMPL_DECLARATION);
    /// A generic reference has no binding declaration.
    pub const UNBOUND_GENERIC: Self = Self(10 | IMPL_DECLARATION);
    /// Shallow evaluation requested for a non-collection argument.
    pub const ARGUMENT_EVAL_SHALLOW_SIMPLE: Self = Self(11 | IMPL_DECLARATION);
    /// The runtime-determined type was used for an argument.
    pub const ARGUMENT_RUNTIME_TYPE: Self = Self(12 | IMPL_DECLARATION);
    /// A key-of generic source is not bound with the structure hint.
    pub const ARGUMENT_REQUIRES_STRUCT_BINDING: Self = Self(13 | IMPL_DECLARATION);
    /// A native type used by an opcode was not supplied.
    pub const MISSING_NATIVE_TYPE: Self = Self(14 | IMPL_DECLARATION);
    /// A constant's declared type is not registered.
    pub const MISSING_DECLARED_TYPE: Self = Self(15 | IMPL_DECLARATION);
    /// A constant's declared type conflicts with a registered type.
    pub const CONFLICTING_TYPES: Self = Self(16 | IMPL_DECLARATION);
    /// A constant value does not have the shape of its type.
    pub const TYPE_VALUE_MISMATCH: Self = Self(17 | IMPL_DECLARATION);
    /// A constant's type contains a generic reference.
    pub const CONSTANT_GENERIC_TYPE: Self = Self(18 | IMPL_DECLARATION);
    /// A type is of no known category.
    pub const UNKNOWN_TYPE_CATEGORY: Self = Self(19 | IMPL_DECLARATION);
    /// A module constant does not exist.
    pub const NO_SUCH_CONSTANT: Self = Self(20 | IMPL_DECLARATION);
    /// A compiled call target is not a callable constant.
    pub const NOT_CALLABLE: Self = Self(21 | IMPL_DECLARATION);
    /// The return cell of a callable is of an unusable kind.
    pub const INVALID_RETURN_CELL: Self = Self(22 | IMPL_DECLARATION);
    /// The argument cell of a callable is missing or malformed.
    pub const INVALID_ARGUMENT_CELL: Self = Self(23 | IMPL_DECLARATION);
    /// A memory value did not hold the kind of value required.
    pub const WRONG_VALUE_TYPE: Self = Self(24 | IMPL_DECLARATION);
    /// An opcode cell names an opcode that was never declared.
    pub const UNKNOWN_OPCODE: Self = Self(25 | IMPL_DECLARATION);
    /// A bound generic type does not satisfy its bind hint.
    pub const BIND_HINT_MISMATCH: Self = Self(26 | IMPL_DECLARATION);
    /// A debugger was attached to an interpreter that already has one.
    pub const DEBUGGER_ALREADY_SET: Self = Self(27 | IMPL_DECLARATION);

    // === Validation: opcodes ===
    /// Wrong number of opcode arguments.
    pub const ARGUMENT_COUNT: Self = Self(1 | VALIDATION_OPCODE);
    /// Opcode argument has the wrong type.
    pub const ARGUMENT_TYPE: Self = Self(2 | VALIDATION_OPCODE);
    /// Opcode argument references a cell that does not exist.
    pub const ARGUMENT_REF: Self = Self(3 | VALIDATION_OPCODE);
    /// Opcode argument has an invalid value.
    pub const ARGUMENT_VALUE: Self = Self(4 | VALIDATION_OPCODE);

    /// Returns the raw numeric code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Returns the family this code belongs to.
    #[must_use]
    pub const fn family(self) -> ProblemFamily {
        match self.0 & FAMILY_MASK {
            VM_ERROR => ProblemFamily::Vm,
            USER_ERROR => ProblemFamily::User,
            IMPL_ERROR => ProblemFamily::Implementation,
            VALIDATION => ProblemFamily::Validation,
            _ => ProblemFamily::Unknown,
        }
    }

    /// Returns true for user (script content) errors.
    #[must_use]
    pub const fn is_user(self) -> bool {
        matches!(self.family(), ProblemFamily::User)
    }

    /// Returns true for internal VM defects, which hosts may treat as faults.
    #[must_use]
    pub const fn is_vm_bug(self) -> bool {
        self.0 & CATEGORY_MASK == VM_BUG
    }

    /// Stable, human-readable name of the code.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::STRUCTURE_CORRUPT => "STRUCTURE_CORRUPT",
            Self::TYPE_CONFUSION => "TYPE_CONFUSION",
            Self::INSTRUCTION_ORDER_VIOLATION => "INSTRUCTION_ORDER_VIOLATION",
            Self::CANCELLED => "CANCELLED",
            Self::STEP_LIMIT_EXCEEDED => "STEP_LIMIT_EXCEEDED",
            Self::UNKNOWN_PRIMARY_TYPE => "UNKNOWN_PRIMARY_TYPE",
            Self::NON_EVALUATED_VALUE => "NON_EVALUATED_VALUE",
            Self::BAD_SPLICE_RANGE => "BAD_SPLICE_RANGE",
            Self::MODULE_NOT_FOUND => "MODULE_NOT_FOUND",
            Self::CONST_NOT_FOUND => "CONST_NOT_FOUND",
            Self::TYPE_MISMATCH => "TYPE_MISMATCH",
            Self::UNKNOWN_TYPE => "UNKNOWN_TYPE",
            Self::INDEX_OUT_OF_RANGE => "INDEX_OUT_OF_RANGE",
            Self::DUPLICATE_TYPE => "DUPLICATE_TYPE",
            Self::DUPLICATE_OPCODES => "DUPLICATE_OPCODES",
            Self::DUPLICATE_MODULE_NAMES => "DUPLICATE_MODULE_NAMES",
            Self::GENERIC_BINDING_DEEP => "GENERIC_BINDING_DEEP",
            Self::GENERIC_BINDING_INDEX => "GENERIC_BINDING_INDEX",
            Self::GENERIC_BINDING_STATE => "GENERIC_BINDING_STATE",
            Self::GENERIC_BINDING_FROM_TYPE => "GENERIC_BINDING_FROM_TYPE",
            Self::GENERIC_BINDING_KEYED_TYPE => "GENERIC_BINDING_KEYED_TYPE",
            Self::DUPLICATE_GENERIC_BINDING => "DUPLICATE_GENERIC_BINDING",
            Self::UNBOUND_GENERIC => "UNBOUND_GENERIC",
            Self::ARGUMENT_EVAL_SHALLOW_SIMPLE => "ARGUMENT_EVAL_SHALLOW_SIMPLE",
            Self::ARGUMENT_RUNTIME_TYPE => "ARGUMENT_RUNTIME_TYPE",
            Self::ARGUMENT_REQUIRES_STRUCT_BINDING => "ARGUMENT_REQUIRES_STRUCT_BINDING",
            Self::MISSING_NATIVE_TYPE => "MISSING_NATIVE_TYPE",
            Self::MISSING_DECLARED_TYPE => "MISSING_DECLARED_TYPE",
            Self::CONFLICTING_TYPES => "CONFLICTING_TYPES",
            Self::TYPE_VALUE_MISMATCH => "TYPE_VALUE_MISMATCH",
            Self::CONSTANT_GENERIC_TYPE => "CONSTANT_GENERIC_TYPE",
            Self::UNKNOWN_TYPE_CATEGORY => "UNKNOWN_TYPE_CATEGORY",
            Self::NO_SUCH_CONSTANT => "NO_SUCH_CONSTANT",
            Self::NOT_CALLABLE => "NOT_CALLABLE",
            Self::INVALID_RETURN_CELL => "INVALID_RETURN_CELL",
            Self::INVALID_ARGUMENT_CELL => "INVALID_ARGUMENT_CELL",
            Self::WRONG_VALUE_TYPE => "WRONG_VALUE_TYPE",
            Self::UNKNOWN_OPCODE => "UNKNOWN_OPCODE",
            Self::BIND_HINT_MISMATCH => "BIND_HINT_MISMATCH",
            Self::DEBUGGER_ALREADY_SET => "DEBUGGER_ALREADY_SET",
            Self::ARGUMENT_COUNT => "ARGUMENT_COUNT",
            Self::ARGUMENT_TYPE => "ARGUMENT_TYPE",
            Self::ARGUMENT_REF => "ARGUMENT_REF",
            Self::ARGUMENT_VALUE => "ARGUMENT_VALUE",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Debug for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#08x})", self.name(), self.0)
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// A single parameter value attached to a problem.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ParamValue {
    /// Text parameter.
    Str(String),
    /// Numeric parameter.
    Num(f64),
}

impl ParamValue {
    /// Returns the text value, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Num(_) => None,
        }
    }

    /// Returns the numeric value, if this is a number.
    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Num(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<i64> for ParamValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Num(value as f64)
    }
}

impl From<usize> for ParamValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: usize) -> Self {
        Self::Num(value as f64)
    }
}

impl From<u64> for ParamValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: u64) -> Self {
        Self::Num(value as f64)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Num(f64::from(value))
    }
}

/// Named problem parameters, ordered by key for stable output.
pub type Parameters = BTreeMap<String, ParamValue>;

// =============================================================================
// Problem
// =============================================================================

/// A validation problem or runtime error.
#[derive(Clone, Debug, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[error("{id}{}", describe(.location, .parameters))]
pub struct Problem {
    /// Where the problem was detected, if known.
    pub location: Option<SourcePosition>,
    /// Stable problem code.
    pub id: ProblemId,
    /// Context parameters; may be augmented while the problem bubbles up.
    pub parameters: Parameters,
}

impl Problem {
    /// Creates a problem with no parameters.
    #[must_use]
    pub fn new(id: ProblemId, location: Option<SourcePosition>) -> Self {
        Self {
            location,
            id,
            parameters: Parameters::new(),
        }
    }

    /// Adds (or replaces) a parameter while building the problem.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Adds a parameter only if the key is not already present.
    ///
    /// Used while bubbling a problem up through callers; the fields set at the
    /// problem's origin are never overwritten.
    #[must_use]
    pub fn augment(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters
            .entry(key.to_string())
            .or_insert_with(|| value.into());
        self
    }

    /// Non-destructively merges a whole parameter bag.
    #[must_use]
    pub fn augment_all(mut self, parameters: &Parameters) -> Self {
        for (key, value) in parameters {
            self.parameters
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Fills in the location if it is not yet known.
    #[must_use]
    pub fn or_location(mut self, location: Option<&SourcePosition>) -> Self {
        if self.location.is_none() {
            self.location = location.cloned();
        }
        self
    }

    /// Looks up a parameter by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    /// Looks up a text parameter by key.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(ParamValue::as_str)
    }

    /// Looks up a numeric parameter by key.
    #[must_use]
    pub fn param_num(&self, key: &str) -> Option<f64> {
        self.param(key).and_then(ParamValue::as_num)
    }
}

fn describe(location: &Option<SourcePosition>, parameters: &Parameters) -> String {
    let mut out = String::new();
    if let Some(location) = location {
        out.push_str(&format!(" at {location}"));
    }
    if !parameters.is_empty() {
        let body: Vec<String> = parameters
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect();
        out.push_str(&format!(" {{{}}}", body.join(", ")));
    }
    out
}

/// Result alias for operations that fail with a single problem.
pub type Result<T> = std::result::Result<T, Problem>;

// =============================================================================
// Problem Batches
// =============================================================================

/// A non-empty batch of problems reported together, typically at load time.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{} problem(s), first: {}", .problems.len(), first_message(.problems))]
pub struct Problems {
    problems: Vec<Problem>,
}

fn first_message(problems: &[Problem]) -> String {
    problems.first().map_or_else(String::new, ToString::to_string)
}

impl Problems {
    /// Wraps a list of problems.
    #[must_use]
    pub fn new(problems: Vec<Problem>) -> Self {
        Self { problems }
    }

    /// The problems, in discovery order.
    #[must_use]
    pub fn as_slice(&self) -> &[Problem] {
        &self.problems
    }

    /// Consumes the batch.
    #[must_use]
    pub fn into_vec(self) -> Vec<Problem> {
        self.problems
    }

    /// Number of problems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// True if there are no problems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Returns true if any problem has the given id.
    #[must_use]
    pub fn contains(&self, id: ProblemId) -> bool {
        self.problems.iter().any(|p| p.id == id)
    }
}

impl From<Problem> for Problems {
    fn from(problem: Problem) -> Self {
        Self::new(vec![problem])
    }
}

impl IntoIterator for Problems {
    type Item = Problem;
    type IntoIter = std::vec::IntoIter<Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.into_iter()
    }
}

/// Collects problems from many checks so they can be reported in one batch.
#[derive(Clone, Debug, Default)]
pub struct ValidationCollector {
    problems: Vec<Problem>,
}

impl ValidationCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one problem.
    pub fn push(&mut self, problem: Problem) -> &mut Self {
        self.problems.push(problem);
        self
    }

    /// Adds any number of problems.
    pub fn extend(&mut self, problems: impl IntoIterator<Item = Problem>) -> &mut Self {
        self.problems.extend(problems);
        self
    }

    /// Adds an optional problem.
    pub fn add(&mut self, problem: Option<Problem>) -> &mut Self {
        if let Some(p) = problem {
            self.problems.push(p);
        }
        self
    }

    /// Records the error side of a result and returns its value, if any.
    pub fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(p) => {
                self.problems.push(p);
                None
            }
        }
    }

    /// True if at least one problem was collected.
    #[must_use]
    pub fn is_err(&self) -> bool {
        !self.problems.is_empty()
    }

    /// The problems collected so far.
    #[must_use]
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Consumes the collector, returning the collected problems.
    #[must_use]
    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }

    /// Returns `value` if nothing was collected, otherwise the batch.
    ///
    /// # Errors
    ///
    /// Returns the collected problems when any were recorded.
    pub fn finish<T>(self, value: T) -> std::result::Result<T, Problems> {
        if self.problems.is_empty() {
            Ok(value)
        } else {
            Err(Problems::new(self.problems))
        }
    }

    /// Collapses the collection to a single runtime error.
    ///
    /// The first problem wins; if others were collected, their count is
    /// recorded under `additional_errors`. Returns `None` if nothing was collected.
    #[must_use]
    pub fn into_runtime_error(self) -> Option<Problem> {
        first_error_wins(self.problems)
    }
}

/// Collapses a list of problems to one, keeping the first and counting the rest.
#[must_use]
pub fn first_error_wins(problems: Vec<Problem>) -> Option<Problem> {
    let extra = problems.len().saturating_sub(1);
    let first = problems.into_iter().next()?;
    Some(if extra > 0 {
        first.augment("additional_errors", extra)
    } else {
        first
    })
}

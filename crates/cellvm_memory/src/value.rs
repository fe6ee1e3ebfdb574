//! Memory values and evaluated values.
//!
//! A [`MemoryValue`] pairs a cell with a write-once memo of its
//! [`EvaluatedValue`]. Clones share the memo, so whichever holder evaluates
//! the cell first makes the result visible to every other holder.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};

use cellvm_foundation::{NativeValue, SourcePosition, VmType};

use crate::cell::{CALLABLE_ARGUMENT_MEMORY_INDEX, CALLABLE_RETURN_MEMORY_INDEX, MemoryCell, MemoryIndex};
use crate::iterable::SpliceNode;
use crate::structure::LayeredStructured;

// =============================================================================
// Memory values
// =============================================================================

struct Slot {
    index: Option<MemoryIndex>,
    cell: Arc<MemoryCell>,
    memo: OnceLock<EvaluatedValue>,
}

/// A memory cell and its (possibly not yet computed) value.
#[derive(Clone)]
pub struct MemoryValue(Arc<Slot>);

impl MemoryValue {
    /// An unevaluated value for a cell.
    #[must_use]
    pub fn new(index: Option<MemoryIndex>, cell: Arc<MemoryCell>) -> Self {
        Self(Arc::new(Slot {
            index,
            cell,
            memo: OnceLock::new(),
        }))
    }

    /// An already-evaluated value for a cell.
    #[must_use]
    pub fn evaluated(index: Option<MemoryIndex>, cell: Arc<MemoryCell>, value: EvaluatedValue) -> Self {
        let memo = OnceLock::new();
        let _ = memo.set(value);
        Self(Arc::new(Slot { index, cell, memo }))
    }

    /// Index in constant or local memory, if the value was allocated there.
    #[must_use]
    pub fn index(&self) -> Option<MemoryIndex> {
        self.0.index
    }

    /// The cell definition.
    #[must_use]
    pub fn cell(&self) -> &Arc<MemoryCell> {
        &self.0.cell
    }

    /// The cell's declared type.
    #[must_use]
    pub fn ty(&self) -> &Arc<VmType> {
        &self.0.cell.ty
    }

    /// The cell's source position.
    #[must_use]
    pub fn source(&self) -> Option<&SourcePosition> {
        self.0.cell.source.as_ref()
    }

    /// The memoized value, if evaluated.
    #[must_use]
    pub fn value(&self) -> Option<&EvaluatedValue> {
        self.0.memo.get()
    }

    /// Returns true once a value has been memoized.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.0.memo.get().is_some()
    }

    /// Stores the evaluated value. The first write wins; the stored value is
    /// returned either way.
    pub fn memoize(&self, value: EvaluatedValue) -> &EvaluatedValue {
        self.0.memo.get_or_init(|| value)
    }

    /// Returns true if both handles share one slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MemoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MemoryValue");
        s.field("index", &self.0.index)
            .field("kind", &self.0.cell.kind.as_str())
            .field("type", &self.0.cell.ty.name());
        match self.value() {
            Some(v) => s.field("value", v),
            None => s.field("value", &"<unevaluated>"),
        };
        s.finish()
    }
}

// =============================================================================
// Capability values
// =============================================================================

/// Position of one element within an iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IterContext {
    /// Zero-based index of the element in the iterable.
    pub index: usize,
    /// True for the first element of the requested range.
    pub first: bool,
    /// True for the last element of the requested range.
    pub last: bool,
}

/// A sub-range for [`IterableValue::for_each_in`].
///
/// A negative `end` counts back from the iterable's length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IterRange {
    /// First index, inclusive. Defaults to zero.
    pub start: Option<usize>,
    /// Last index, exclusive. Defaults to the length.
    pub end: Option<isize>,
}

impl IterRange {
    /// The whole iterable.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// An explicit range.
    #[must_use]
    pub const fn new(start: usize, end: isize) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Clamps the range to an iterable of `len` elements. Returns `None` if
    /// the range is empty.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn resolve(self, len: usize) -> Option<(usize, usize)> {
        let start = self.start.unwrap_or(0);
        let end = match self.end {
            None => len,
            Some(end) if end < 0 => (len as isize + end).max(0) as usize,
            Some(end) => (end as usize).min(len),
        };
        (start < end).then_some((start, end))
    }
}

/// Visitor for iterable elements. Return `ControlFlow::Break` to stop.
pub type IterVisitor<'a> = dyn FnMut(&MemoryValue, IterContext) -> ControlFlow<()> + 'a;

/// Visitor for structure entries. Return `ControlFlow::Break` to stop.
pub type StructVisitor<'a> = dyn FnMut(&str, &MemoryValue) -> ControlFlow<()> + 'a;

/// An ordered sequence of memory values.
pub trait IterableValue: Send + Sync {
    /// Number of elements.
    fn size(&self) -> usize;

    /// Element at a zero-based index.
    fn get(&self, index: usize) -> Option<MemoryValue>;

    /// Visits the elements of a sub-range in order.
    fn for_each_in(&self, range: IterRange, visitor: &mut IterVisitor<'_>);

    /// Visits every element in order.
    fn for_each(&self, visitor: &mut IterVisitor<'_>) {
        self.for_each_in(IterRange::all(), visitor);
    }

    /// Collects every element.
    fn to_vec(&self) -> Vec<MemoryValue> {
        let mut out = Vec::with_capacity(self.size());
        self.for_each(&mut |v, _| {
            out.push(v.clone());
            ControlFlow::Continue(())
        });
        out
    }

    /// The rope representation, when this iterable is one.
    fn as_splice(&self) -> Option<&SpliceNode> {
        None
    }
}

/// A keyed record of memory values.
pub trait StructuredValue: Send + Sync {
    /// Keys, in a stable order.
    fn keys(&self) -> Vec<String>;

    /// Value for a key.
    fn get(&self, key: &str) -> Option<MemoryValue>;

    /// Returns true if the key exists.
    fn contains(&self, key: &str) -> bool;

    /// Visits each entry in key order.
    fn for_each(&self, visitor: &mut StructVisitor<'_>) {
        for key in self.keys() {
            if let Some(value) = self.get(&key) {
                if visitor(&key, &value).is_break() {
                    return;
                }
            }
        }
    }

    /// The layered representation, when this structure is one.
    fn as_layered(&self) -> Option<&LayeredStructured> {
        None
    }
}

/// A function: an indexed graph of memory cells.
///
/// Index 0 is the return cell and index 1 the argument cell.
#[derive(Clone, Debug)]
pub struct CallableValue {
    /// Where the function was defined.
    pub source: Option<SourcePosition>,
    cells: BTreeMap<MemoryIndex, MemoryCell>,
}

impl CallableValue {
    /// Creates a callable from its cells.
    #[must_use]
    pub fn new(cells: impl IntoIterator<Item = (MemoryIndex, MemoryCell)>) -> Self {
        Self {
            source: None,
            cells: cells.into_iter().collect(),
        }
    }

    /// Sets the source position.
    #[must_use]
    pub fn with_source(mut self, source: SourcePosition) -> Self {
        self.source = Some(source);
        self
    }

    /// All cells by index.
    #[must_use]
    pub const fn cells(&self) -> &BTreeMap<MemoryIndex, MemoryCell> {
        &self.cells
    }

    /// The cell at an index.
    #[must_use]
    pub fn cell(&self, index: MemoryIndex) -> Option<&MemoryCell> {
        self.cells.get(&index)
    }

    /// The return cell.
    #[must_use]
    pub fn return_cell(&self) -> Option<&MemoryCell> {
        self.cell(CALLABLE_RETURN_MEMORY_INDEX)
    }

    /// The argument cell.
    #[must_use]
    pub fn argument_cell(&self) -> Option<&MemoryCell> {
        self.cell(CALLABLE_ARGUMENT_MEMORY_INDEX)
    }
}

// =============================================================================
// Evaluated values
// =============================================================================

/// The value of an evaluated memory cell.
#[derive(Clone)]
pub enum EvaluatedValue {
    /// A native scalar or object.
    Native(NativeValue),
    /// A key of some structure.
    Key(String),
    /// An ordered sequence.
    Iterable(Arc<dyn IterableValue>),
    /// A keyed record.
    Structured(Arc<dyn StructuredValue>),
    /// A function.
    Callable(Arc<CallableValue>),
}

impl EvaluatedValue {
    /// Lowercase kind name for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Native(_) => "native",
            Self::Key(_) => "key",
            Self::Iterable(_) => "iterable",
            Self::Structured(_) => "structured",
            Self::Callable(_) => "callable",
        }
    }

    /// Returns the native value, if this is one.
    #[must_use]
    pub const fn as_native(&self) -> Option<&NativeValue> {
        match self {
            Self::Native(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the integer, if this is a native integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        self.as_native().and_then(NativeValue::as_int)
    }

    /// Returns the number, widening integers.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        self.as_native().and_then(NativeValue::as_number)
    }

    /// Returns the string, if this is a native string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_native().and_then(NativeValue::as_str)
    }

    /// Returns the key, if this is a key reference.
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Returns the iterable, if this is one.
    #[must_use]
    pub fn as_iterable(&self) -> Option<&Arc<dyn IterableValue>> {
        match self {
            Self::Iterable(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the structure, if this is one.
    #[must_use]
    pub fn as_structured(&self) -> Option<&Arc<dyn StructuredValue>> {
        match self {
            Self::Structured(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the callable, if this is one.
    #[must_use]
    pub const fn as_callable(&self) -> Option<&Arc<CallableValue>> {
        match self {
            Self::Callable(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for EvaluatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(v) => write!(f, "{v:?}"),
            Self::Key(k) => write!(f, "key {k:?}"),
            Self::Iterable(it) => {
                let mut list = f.debug_list();
                it.for_each(&mut |v, _| {
                    match v.value() {
                        Some(inner) => list.entry(inner),
                        None => list.entry(&"<unevaluated>"),
                    };
                    ControlFlow::Continue(())
                });
                list.finish()
            }
            Self::Structured(s) => {
                let mut map = f.debug_map();
                s.for_each(&mut |k, v| {
                    match v.value() {
                        Some(inner) => map.entry(&k, inner),
                        None => map.entry(&k, &"<unevaluated>"),
                    };
                    ControlFlow::Continue(())
                });
                map.finish()
            }
            Self::Callable(c) => write!(f, "<callable with {} cells>", c.cells().len()),
        }
    }
}

impl From<NativeValue> for EvaluatedValue {
    fn from(value: NativeValue) -> Self {
        Self::Native(value)
    }
}

impl From<i64> for EvaluatedValue {
    fn from(value: i64) -> Self {
        Self::Native(NativeValue::Int(value))
    }
}

impl From<f64> for EvaluatedValue {
    fn from(value: f64) -> Self {
        Self::Native(NativeValue::Number(value))
    }
}

impl From<&str> for EvaluatedValue {
    fn from(value: &str) -> Self {
        Self::Native(NativeValue::from(value))
    }
}

impl From<CallableValue> for EvaluatedValue {
    fn from(value: CallableValue) -> Self {
        Self::Callable(Arc::new(value))
    }
}

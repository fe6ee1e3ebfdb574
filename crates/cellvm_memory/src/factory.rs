//! Factories opcodes use to build new values during evaluation.
//!
//! Everything a factory creates is allocated in the caller's local memory,
//! so the values it returns carry memory indices and can be referenced by
//! later calls.

use std::sync::Arc;

use cellvm_foundation::{Problem, ProblemId, RUNTIME_TYPE, Result, SourcePosition, TypeRef, TypeRegistry, VmType};
use tracing::trace;

use crate::cell::MemoryCell;
use crate::iterable::SpliceNode;
use crate::store::LocalMemory;
use crate::structure::LayeredStructured;
use crate::value::{EvaluatedValue, MemoryValue};

/// Entry point handed to opcodes.
#[derive(Clone, Copy, Debug)]
pub struct MemoryFactory<'a> {
    memory: &'a LocalMemory,
}

impl<'a> MemoryFactory<'a> {
    /// Creates a factory allocating in `memory`.
    #[must_use]
    pub const fn new(memory: &'a LocalMemory) -> Self {
        Self { memory }
    }

    /// Iterable constructors.
    #[must_use]
    pub const fn iterable(&self) -> IterableFactory<'a> {
        IterableFactory { memory: self.memory }
    }

    /// Structure constructors.
    #[must_use]
    pub const fn structure(&self) -> StructureFactory<'a> {
        StructureFactory { memory: self.memory }
    }

    /// Deferred call constructor.
    #[must_use]
    pub const fn call(&self) -> CallFactory<'a> {
        CallFactory { memory: self.memory }
    }

    /// The memory values are allocated in.
    #[must_use]
    pub const fn memory(&self) -> &'a LocalMemory {
        self.memory
    }

    /// The type registry.
    #[must_use]
    pub fn types(&self) -> &'a TypeRegistry {
        self.memory.types()
    }
}

fn constructed_cell(name: String, ty: Arc<VmType>) -> Arc<MemoryCell> {
    Arc::new(MemoryCell::external(name, ty).with_source(SourcePosition::internal("constructed")))
}

fn evaluated_of(value: &MemoryValue) -> Result<&EvaluatedValue> {
    value.value().ok_or_else(|| {
        Problem::new(ProblemId::NON_EVALUATED_VALUE, value.source().cloned())
            .with("type", value.ty().name())
    })
}

fn wrong_kind(value: &MemoryValue, expected: &str, actual: &str) -> Problem {
    Problem::new(ProblemId::WRONG_VALUE_TYPE, value.source().cloned())
        .with("expected", expected)
        .with("actual", actual)
}

/// Checks a member against the type it is stored under. Generic and
/// runtime-determined positions accept anything.
fn check_member(types: &TypeRegistry, value: &MemoryValue, expected: &TypeRef) -> Result<()> {
    if expected.as_generic().is_some() || value.ty().is_runtime_determined() {
        return Ok(());
    }
    if expected.as_type().is_some_and(|t| t.is_runtime_determined()) {
        return Ok(());
    }
    types.enforce_ref_match(value.source(), &TypeRef::from(Arc::clone(value.ty())), expected)
}

// =============================================================================
// Iterables
// =============================================================================

/// Builds spliced iterables.
#[derive(Clone, Copy, Debug)]
pub struct IterableFactory<'a> {
    memory: &'a LocalMemory,
}

impl IterableFactory<'_> {
    /// The rope behind an evaluated iterable value. Other iterables are
    /// copied into a fresh rope.
    ///
    /// # Errors
    ///
    /// `NON_EVALUATED_VALUE` if `value` has not been evaluated,
    /// `WRONG_VALUE_TYPE` if it is not an iterable.
    pub fn splice_of(&self, value: &MemoryValue) -> Result<SpliceNode> {
        match evaluated_of(value)? {
            EvaluatedValue::Iterable(it) => Ok(it
                .as_splice()
                .cloned()
                .unwrap_or_else(|| SpliceNode::from_values(it.to_vec()))),
            other => Err(wrong_kind(value, "iterable", other.kind_name())),
        }
    }

    /// An iterable over existing memory values.
    #[must_use]
    pub fn from_memory(&self, values: Vec<MemoryValue>) -> EvaluatedValue {
        EvaluatedValue::Iterable(Arc::new(SpliceNode::from_values(values)))
    }

    /// An iterable over fresh values, each allocated in its own cell of
    /// `element_type`.
    #[must_use]
    pub fn from_values(&self, values: Vec<EvaluatedValue>, element_type: &Arc<VmType>) -> EvaluatedValue {
        let cells = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let cell = constructed_cell(format!("iterable.{i}"), Arc::clone(element_type));
                self.memory.allocate(cell, Some(v))
            })
            .collect();
        self.from_memory(cells)
    }

    /// `first` followed by `second`.
    ///
    /// # Errors
    ///
    /// As for [`splice_of`](Self::splice_of).
    pub fn append(&self, first: &MemoryValue, second: &MemoryValue) -> Result<EvaluatedValue> {
        let joined = self.splice_of(first)?.append(&self.splice_of(second)?);
        Ok(EvaluatedValue::Iterable(Arc::new(joined)))
    }

    /// `iterable` with `value` added at the end.
    ///
    /// # Errors
    ///
    /// As for [`splice_of`](Self::splice_of).
    pub fn push(&self, iterable: &MemoryValue, value: MemoryValue) -> Result<EvaluatedValue> {
        let pushed = self.splice_of(iterable)?.push(value);
        Ok(EvaluatedValue::Iterable(Arc::new(pushed)))
    }

    /// `iterable` with the element at `index` replaced. A negative index
    /// counts from the end.
    ///
    /// # Errors
    ///
    /// `INDEX_OUT_OF_RANGE`, or as for [`splice_of`](Self::splice_of).
    pub fn replace(&self, iterable: &MemoryValue, index: isize, value: MemoryValue) -> Result<EvaluatedValue> {
        let replaced = self.splice_of(iterable)?.replace(index, value)?;
        Ok(EvaluatedValue::Iterable(Arc::new(replaced)))
    }

    /// Elements `[start, end)` of `iterable`.
    ///
    /// # Errors
    ///
    /// `INDEX_OUT_OF_RANGE`, or as for [`splice_of`](Self::splice_of).
    pub fn sub(&self, iterable: &MemoryValue, start: usize, end: usize) -> Result<EvaluatedValue> {
        let sub = self.splice_of(iterable)?.sub(start, end)?;
        Ok(EvaluatedValue::Iterable(Arc::new(sub)))
    }

    /// `first` with `second` inserted before position `at`.
    ///
    /// # Errors
    ///
    /// `INDEX_OUT_OF_RANGE`, or as for [`splice_of`](Self::splice_of).
    pub fn insert_iterable(&self, first: &MemoryValue, second: &MemoryValue, at: usize) -> Result<EvaluatedValue> {
        let inserted = self.splice_of(first)?.insert(at, &self.splice_of(second)?)?;
        Ok(EvaluatedValue::Iterable(Arc::new(inserted)))
    }
}

// =============================================================================
// Structures
// =============================================================================

/// Builds layered structures.
#[derive(Clone, Copy, Debug)]
pub struct StructureFactory<'a> {
    memory: &'a LocalMemory,
}

impl StructureFactory<'_> {
    fn check_entries(&self, entries: &[(String, MemoryValue)], ty: &VmType) -> Result<()> {
        let Some(structured) = ty.as_structured() else {
            return Err(Problem::new(ProblemId::WRONG_VALUE_TYPE, ty.source().cloned())
                .with("expected", "structured")
                .with("actual", ty.category().as_str()));
        };
        for (key, value) in entries {
            let Some(store) = structured.stores.get(key) else {
                return Err(Problem::new(ProblemId::TYPE_MISMATCH, value.source().cloned())
                    .with("unexpected_key", key.as_str())
                    .with("expected", ty.name()));
            };
            check_member(self.memory.types(), value, store).map_err(|p| p.augment("key", key.as_str()))?;
        }
        Ok(())
    }

    fn allocate_entries(
        &self,
        entries: impl IntoIterator<Item = (String, EvaluatedValue)>,
        ty: &VmType,
    ) -> Result<Vec<(String, MemoryValue)>> {
        let stores = ty.as_structured().map(|s| &s.stores);
        entries
            .into_iter()
            .map(|(key, value)| -> Result<(String, MemoryValue)> {
                let member = match stores.and_then(|s| s.get(&key)) {
                    Some(store) if store.as_generic().is_none() => self.memory.types().resolve(store)?,
                    _ => Arc::clone(&RUNTIME_TYPE),
                };
                let cell = constructed_cell(format!("structure.{key}"), member);
                let slot = self.memory.allocate(cell, Some(value));
                Ok((key, slot))
            })
            .collect()
    }

    /// A structure of type `ty` over existing memory values.
    ///
    /// # Errors
    ///
    /// `WRONG_VALUE_TYPE` if `ty` is not structured, `TYPE_MISMATCH` for a
    /// key the type does not store or a member of the wrong type.
    pub fn from_memory(
        &self,
        entries: impl IntoIterator<Item = (String, MemoryValue)>,
        ty: &Arc<VmType>,
    ) -> Result<EvaluatedValue> {
        let entries: Vec<_> = entries.into_iter().collect();
        self.check_entries(&entries, ty)?;
        Ok(EvaluatedValue::Structured(Arc::new(LayeredStructured::new(
            entries,
            Arc::clone(ty),
        ))))
    }

    /// A structure of type `ty` over fresh values.
    ///
    /// # Errors
    ///
    /// As for [`from_memory`](Self::from_memory).
    pub fn from_values(
        &self,
        entries: impl IntoIterator<Item = (String, EvaluatedValue)>,
        ty: &Arc<VmType>,
    ) -> Result<EvaluatedValue> {
        let entries = self.allocate_entries(entries, ty)?;
        self.from_memory(entries, ty)
    }

    /// A child of `base` with `entries` overriding it. The child keeps the
    /// base type unless `ty` is given.
    ///
    /// # Errors
    ///
    /// `NON_EVALUATED_VALUE` or `WRONG_VALUE_TYPE` for a bad base, otherwise
    /// as for [`from_memory`](Self::from_memory).
    pub fn update_from_memory(
        &self,
        base: &MemoryValue,
        entries: impl IntoIterator<Item = (String, MemoryValue)>,
        ty: Option<Arc<VmType>>,
    ) -> Result<EvaluatedValue> {
        let parent = match evaluated_of(base)? {
            EvaluatedValue::Structured(s) => match s.as_layered() {
                Some(layered) => layered.clone(),
                None => {
                    let mut layer = Vec::new();
                    for key in s.keys() {
                        if let Some(v) = s.get(&key) {
                            layer.push((key, v));
                        }
                    }
                    LayeredStructured::new(layer, Arc::clone(base.ty()))
                }
            },
            other => return Err(wrong_kind(base, "structured", other.kind_name())),
        };
        let entries: Vec<_> = entries.into_iter().collect();
        let child_ty = ty.unwrap_or_else(|| Arc::clone(parent.ty()));
        self.check_entries(&entries, &child_ty)?;
        trace!(depth = parent.depth() + 1, "layered structure update");
        Ok(EvaluatedValue::Structured(Arc::new(parent.create_child(entries, Some(child_ty)))))
    }

    /// Like [`update_from_memory`](Self::update_from_memory), over fresh values.
    ///
    /// # Errors
    ///
    /// As for [`update_from_memory`](Self::update_from_memory).
    pub fn update_from_values(
        &self,
        base: &MemoryValue,
        entries: impl IntoIterator<Item = (String, EvaluatedValue)>,
        ty: Option<Arc<VmType>>,
    ) -> Result<EvaluatedValue> {
        let target = ty.clone().unwrap_or_else(|| Arc::clone(base.ty()));
        let entries = self.allocate_entries(entries, &target)?;
        self.update_from_memory(base, entries, ty)
    }
}

// =============================================================================
// Calls
// =============================================================================

/// Builds deferred calls.
#[derive(Clone, Copy, Debug)]
pub struct CallFactory<'a> {
    memory: &'a LocalMemory,
}

impl CallFactory<'_> {
    /// An unevaluated value that, once forced, calls `callable` with
    /// `argument`. The result type is the callable's return type, or the
    /// runtime-determined type when that is generic.
    ///
    /// # Errors
    ///
    /// `WRONG_VALUE_TYPE` if `callable` is not of a callable type,
    /// `TYPE_MISMATCH` if the argument does not fit, `STRUCTURE_CORRUPT` if
    /// either value has no memory index.
    pub fn create_call(&self, callable: &MemoryValue, argument: &MemoryValue) -> Result<MemoryValue> {
        let Some(signature) = callable.ty().as_callable() else {
            return Err(wrong_kind(callable, "callable", callable.ty().category().as_str()));
        };
        check_member(self.memory.types(), argument, &signature.argument_type)?;
        let (Some(callable_index), Some(argument_index)) = (callable.index(), argument.index()) else {
            return Err(Problem::new(ProblemId::STRUCTURE_CORRUPT, callable.source().cloned())
                .with("reason", "call values must live in memory"));
        };
        let return_type = match &signature.return_type {
            TypeRef::Generic(_) => Arc::clone(&RUNTIME_TYPE),
            other => self.memory.types().resolve(other)?,
        };
        let mut cell = MemoryCell::calling(callable_index, argument_index, return_type);
        cell.source = callable.source().cloned();
        trace!(callable = callable_index, argument = argument_index, "deferred call created");
        Ok(self.memory.allocate(Arc::new(cell), None))
    }
}

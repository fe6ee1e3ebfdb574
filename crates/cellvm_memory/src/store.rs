//! Constant memory and per-call local memory.
//!
//! Constant memory is compiled once from the script's modules and is then
//! shared read-only. Local memory layers on top of it for the duration of a
//! call: its indices continue after the last constant index.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use cellvm_foundation::{Problem, ProblemId, Problems, TypeRegistry, ValidationCollector};
use tracing::debug;

use crate::cell::{MemoryCell, MemoryIndex};
use crate::constant::convert_constant;
use crate::module::Module;
use crate::value::{EvaluatedValue, MemoryValue};

/// Builds the identifier under which a module constant is indexed.
#[must_use]
pub fn module_constant_id(module: &str, constant: &str) -> String {
    format!("{module}!{constant}")
}

/// Something that can hand out new memory slots.
pub trait MemoryAllocator {
    /// Allocates a slot for a cell, optionally already evaluated.
    fn allocate(&mut self, cell: Arc<MemoryCell>, value: Option<EvaluatedValue>) -> MemoryValue;
}

/// A read view of indexed memory.
pub trait MemoryStore {
    /// Number of slots.
    fn len(&self) -> usize;

    /// Returns true if there are no slots.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slot at an index.
    fn value_at(&self, index: MemoryIndex) -> Option<MemoryValue>;

    /// Index of a module constant.
    fn lookup_constant(&self, module: &str, constant: &str) -> Option<MemoryIndex>;
}

// =============================================================================
// Constant memory
// =============================================================================

/// Append-only, index-stable memory holding every module constant and its
/// elements.
#[derive(Debug, Default)]
pub struct ConstantMemory {
    values: Vec<MemoryValue>,
    constants: HashMap<String, MemoryIndex>,
}

impl ConstantMemory {
    /// Converts every module constant into memory.
    ///
    /// Callables are stored as values; compiling them is left to the caller.
    ///
    /// # Errors
    ///
    /// Every problem found: `DUPLICATE_MODULE_NAMES`, `MISSING_DECLARED_TYPE`
    /// when a constant's type is not registered, `CONFLICTING_TYPES` when it
    /// differs from the registered type of that name, and conversion
    /// problems.
    pub fn compile(types: &TypeRegistry, modules: &[Module]) -> Result<Self, Problems> {
        let mut problems = ValidationCollector::new();
        let mut memory = Self::default();
        let mut seen = BTreeSet::new();

        for module in modules {
            if !seen.insert(module.name.as_str()) {
                problems.push(
                    Problem::new(ProblemId::DUPLICATE_MODULE_NAMES, module.source.clone())
                        .with("module", module.name.as_str()),
                );
                continue;
            }
            for (name, constant) in &module.constants {
                let params = |id| {
                    Problem::new(id, constant.source.clone())
                        .with("module", module.name.as_str())
                        .with("constant", name.as_str())
                        .with("type", constant.ty.name())
                };
                let Some(registered) = types.get_type_by_name(constant.ty.name()) else {
                    problems.push(params(ProblemId::MISSING_DECLARED_TYPE));
                    continue;
                };
                if !Arc::ptr_eq(&registered, &constant.ty)
                    && !registered.same_definition(&constant.ty)
                {
                    problems.push(params(ProblemId::CONFLICTING_TYPES));
                    continue;
                }
                let mut cell = MemoryCell::constant(module.name.as_str(), name.as_str(), registered);
                cell.source.clone_from(&constant.source);
                match convert_constant(&mut memory, types, cell, &constant.value) {
                    Ok(value) => {
                        if let Some(index) = value.index() {
                            memory
                                .constants
                                .insert(module_constant_id(&module.name, name), index);
                        }
                    }
                    Err(found) => {
                        problems.extend(found);
                    }
                }
            }
            debug!(module = %module.name, constants = module.constants.len(), "compiled module memory");
        }
        problems.finish(memory)
    }

    /// The slot at an index.
    #[must_use]
    pub fn get(&self, index: MemoryIndex) -> Option<&MemoryValue> {
        self.values.get(index)
    }

    /// Index of a module constant.
    #[must_use]
    pub fn lookup(&self, module: &str, constant: &str) -> Option<MemoryIndex> {
        self.constants.get(&module_constant_id(module, constant)).copied()
    }

    /// Number of slots, including constant elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Indices of the top-level module constants, in index order.
    #[must_use]
    pub fn constant_indices(&self) -> Vec<MemoryIndex> {
        let mut out: Vec<MemoryIndex> = self.constants.values().copied().collect();
        out.sort_unstable();
        out
    }
}

impl MemoryAllocator for ConstantMemory {
    fn allocate(&mut self, cell: Arc<MemoryCell>, value: Option<EvaluatedValue>) -> MemoryValue {
        let index = self.values.len();
        let slot = match value {
            Some(v) => MemoryValue::evaluated(Some(index), cell, v),
            None => MemoryValue::new(Some(index), cell),
        };
        self.values.push(slot.clone());
        slot
    }
}

impl MemoryStore for ConstantMemory {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn value_at(&self, index: MemoryIndex) -> Option<MemoryValue> {
        self.values.get(index).cloned()
    }

    fn lookup_constant(&self, module: &str, constant: &str) -> Option<MemoryIndex> {
        self.lookup(module, constant)
    }
}

// =============================================================================
// Local memory
// =============================================================================

/// Memory private to one function run, layered over constant memory.
#[derive(Debug)]
pub struct LocalMemory {
    parent: Arc<ConstantMemory>,
    parent_len: usize,
    types: Arc<TypeRegistry>,
    local: Mutex<Vec<MemoryValue>>,
}

impl LocalMemory {
    /// Creates empty local memory over `parent`.
    #[must_use]
    pub fn new(parent: Arc<ConstantMemory>, types: Arc<TypeRegistry>) -> Self {
        let parent_len = parent.len();
        Self {
            parent,
            parent_len,
            types,
            local: Mutex::new(Vec::new()),
        }
    }

    /// The shared constant memory.
    #[must_use]
    pub const fn parent(&self) -> &Arc<ConstantMemory> {
        &self.parent
    }

    /// The type registry.
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Number of slots allocated locally.
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.local.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Allocates a local slot.
    pub fn allocate(&self, cell: Arc<MemoryCell>, value: Option<EvaluatedValue>) -> MemoryValue {
        let mut local = self.local.lock().unwrap_or_else(PoisonError::into_inner);
        let index = self.parent_len + local.len();
        let slot = match value {
            Some(v) => MemoryValue::evaluated(Some(index), cell, v),
            None => MemoryValue::new(Some(index), cell),
        };
        local.push(slot.clone());
        slot
    }
}

impl MemoryAllocator for &LocalMemory {
    fn allocate(&mut self, cell: Arc<MemoryCell>, value: Option<EvaluatedValue>) -> MemoryValue {
        LocalMemory::allocate(self, cell, value)
    }
}

impl MemoryStore for LocalMemory {
    fn len(&self) -> usize {
        self.parent_len + self.local_len()
    }

    fn value_at(&self, index: MemoryIndex) -> Option<MemoryValue> {
        if index < self.parent_len {
            return self.parent.value_at(index);
        }
        self.local
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index - self.parent_len)
            .cloned()
    }

    fn lookup_constant(&self, module: &str, constant: &str) -> Option<MemoryIndex> {
        self.parent.lookup(module, constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ConstantValue, StoredConstantValue};
    use crate::test_support::{int_type, str_type};
    use cellvm_foundation::VmType;

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.add_type(&int_type()).unwrap();
        reg.add_type(&str_type()).unwrap();
        reg
    }

    #[test]
    fn compile_indexes_constants() {
        let reg = registry();
        let m = Module::new("m")
            .with_constant("one", ConstantValue::new(int_type(), 1_i64))
            .with_constant("two", ConstantValue::new(int_type(), 2_i64));
        let mem = ConstantMemory::compile(&reg, &[m]).unwrap();
        assert_eq!(mem.len(), 2);
        let one = mem.lookup("m", "one").unwrap();
        assert_eq!(mem.get(one).unwrap().value().and_then(EvaluatedValue::as_int), Some(1));
        assert!(mem.lookup("m", "three").is_none());
        assert!(mem.lookup_constant("x", "one").is_none());
        assert_eq!(mem.constant_indices(), vec![0, 1]);
    }

    #[test]
    fn compile_batches_problems() {
        let reg = registry();
        let unregistered = std::sync::Arc::new(VmType::native("float", "f32", |_| true));
        let conflicting = std::sync::Arc::new(VmType::native("int", "i16", |_| true));
        let modules = [
            Module::new("m")
                .with_constant("a", ConstantValue::new(unregistered, 1.5))
                .with_constant("b", ConstantValue::new(conflicting, 1_i64))
                .with_constant("c", ConstantValue::new(int_type(), "nope")),
            Module::new("m"),
        ];
        let problems = ConstantMemory::compile(&reg, &modules).unwrap_err();
        assert_eq!(problems.len(), 4);
        assert!(problems.contains(ProblemId::MISSING_DECLARED_TYPE));
        assert!(problems.contains(ProblemId::CONFLICTING_TYPES));
        assert!(problems.contains(ProblemId::TYPE_VALUE_MISMATCH));
        assert!(problems.contains(ProblemId::DUPLICATE_MODULE_NAMES));
    }

    #[test]
    fn local_indices_follow_parent() {
        let reg = Arc::new(registry());
        let m = Module::new("m").with_constant(
            "list",
            ConstantValue::new(int_type(), StoredConstantValue::from(7_i64)),
        );
        let parent = Arc::new(ConstantMemory::compile(&reg, &[m]).unwrap());
        let local = LocalMemory::new(Arc::clone(&parent), reg);
        let cell = Arc::new(MemoryCell::external("tmp", int_type()));
        let v = local.allocate(Arc::clone(&cell), Some(EvaluatedValue::from(3_i64)));
        assert_eq!(v.index(), Some(1));
        assert_eq!(local.len(), 2);
        assert_eq!(local.local_len(), 1);
        assert!(local.value_at(1).unwrap().ptr_eq(&v));
        assert_eq!(
            local.value_at(0).unwrap().value().and_then(EvaluatedValue::as_int),
            Some(7)
        );
        assert!(local.value_at(2).is_none());
        assert_eq!(local.lookup_constant("m", "list"), Some(0));

        let mut alloc = &local;
        let w = MemoryAllocator::allocate(&mut alloc, cell, None);
        assert_eq!(w.index(), Some(2));
        assert!(!w.is_evaluated());
    }
}

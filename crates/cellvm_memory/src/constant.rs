//! Conversion of host-supplied constants into memory cells.
//!
//! Conversion is recursive. Child values are allocated before their parent
//! in cells named `parent.index` or `parent.key`, so a parent's index is
//! always greater than its children's.

use std::collections::BTreeMap;
use std::sync::Arc;

use cellvm_foundation::{KeyOfType, NativeValue, Problem, ProblemId, TypeRegistry, VmType};

use crate::cell::{CellKind, MemoryCell};
use crate::iterable::SimpleIterable;
use crate::module::StoredConstantValue;
use crate::store::MemoryAllocator;
use crate::structure::SimpleStructured;
use crate::value::{EvaluatedValue, MemoryValue};

/// Converts a constant into memory, allocating a cell for it and for each
/// of its elements.
///
/// # Errors
///
/// Every problem found: `TYPE_VALUE_MISMATCH` when the value's shape does
/// not fit the cell type, `CONSTANT_GENERIC_TYPE` when the type contains a
/// generic, `UNKNOWN_TYPE` for unresolvable child types.
pub fn convert_constant<A: MemoryAllocator + ?Sized>(
    alloc: &mut A,
    types: &TypeRegistry,
    cell: MemoryCell,
    value: &StoredConstantValue,
) -> Result<MemoryValue, Vec<Problem>> {
    let ty = Arc::clone(&cell.ty);
    match (&*ty, value) {
        (VmType::Native(native), StoredConstantValue::Native(v)) => {
            if !(native.is_type)(v) {
                return Err(vec![conversion_problem(&cell, ProblemId::TYPE_VALUE_MISMATCH)
                    .with("value_kind", v.kind_name())]);
            }
            Ok(alloc.allocate(Arc::new(cell), Some(EvaluatedValue::Native(v.clone()))))
        }
        (VmType::KeyOf(key_of), StoredConstantValue::Key(key)) => {
            convert_key(alloc, types, cell, key_of, key)
        }
        (VmType::KeyOf(key_of), StoredConstantValue::Native(NativeValue::Str(key))) => {
            convert_key(alloc, types, cell, key_of, key)
        }
        (VmType::Callable(callable), StoredConstantValue::Callable(c)) => {
            if callable.argument_type.as_generic().is_some()
                || callable.return_type.as_generic().is_some()
            {
                return Err(vec![conversion_problem(&cell, ProblemId::CONSTANT_GENERIC_TYPE)]);
            }
            Ok(alloc.allocate(Arc::new(cell), Some(EvaluatedValue::Callable(Arc::clone(c)))))
        }
        (VmType::Iterable(iterable), StoredConstantValue::List(items)) => {
            if iterable.value_type.as_generic().is_some() {
                return Err(vec![conversion_problem(&cell, ProblemId::CONSTANT_GENERIC_TYPE)]);
            }
            let element = types
                .resolve(&iterable.value_type)
                .map_err(|p| vec![augment(p, &cell)])?;
            let mut problems = Vec::new();
            let mut children = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let sub = cell.sub_cell(&i.to_string(), Arc::clone(&element));
                match convert_constant(alloc, types, sub, item) {
                    Ok(v) => children.push(v),
                    Err(p) => problems.extend(p),
                }
            }
            if !problems.is_empty() {
                return Err(problems);
            }
            let value = EvaluatedValue::Iterable(Arc::new(SimpleIterable::new(children)));
            Ok(alloc.allocate(Arc::new(cell), Some(value)))
        }
        (VmType::Structured(structured), StoredConstantValue::Record(entries)) => {
            let mut problems = Vec::new();
            for key in structured.stores.keys() {
                if !entries.contains_key(key) {
                    problems.push(
                        conversion_problem(&cell, ProblemId::TYPE_VALUE_MISMATCH).with("missing_key", key.as_str()),
                    );
                }
            }
            let mut children = BTreeMap::new();
            for (key, item) in entries {
                let Some(store) = structured.stores.get(key) else {
                    problems.push(
                        conversion_problem(&cell, ProblemId::TYPE_VALUE_MISMATCH).with("unexpected_key", key.as_str()),
                    );
                    continue;
                };
                if store.as_generic().is_some() {
                    problems.push(conversion_problem(&cell, ProblemId::CONSTANT_GENERIC_TYPE).with("key", key.as_str()));
                    continue;
                }
                let child_ty = match types.resolve(store) {
                    Ok(t) => t,
                    Err(p) => {
                        problems.push(augment(p, &cell).with("key", key.as_str()));
                        continue;
                    }
                };
                match convert_constant(alloc, types, cell.sub_cell(key, child_ty), item) {
                    Ok(v) => {
                        children.insert(key.clone(), v);
                    }
                    Err(p) => problems.extend(p),
                }
            }
            if !problems.is_empty() {
                return Err(problems);
            }
            let value = EvaluatedValue::Structured(Arc::new(SimpleStructured::new(children)));
            Ok(alloc.allocate(Arc::new(cell), Some(value)))
        }
        _ => Err(vec![conversion_problem(&cell, ProblemId::TYPE_VALUE_MISMATCH)
            .with("category", ty.category().as_str())
            .with("value_kind", value.shape())]),
    }
}

fn convert_key<A: MemoryAllocator + ?Sized>(
    alloc: &mut A,
    types: &TypeRegistry,
    cell: MemoryCell,
    key_of: &KeyOfType,
    key: &str,
) -> Result<MemoryValue, Vec<Problem>> {
    if key_of.structure_source.as_generic().is_some() {
        return Err(vec![conversion_problem(&cell, ProblemId::CONSTANT_GENERIC_TYPE)]);
    }
    let structure = types
        .resolve(&key_of.structure_source)
        .map_err(|p| vec![augment(p, &cell)])?;
    let known = structure
        .as_structured()
        .is_some_and(|s| s.stores.contains_key(key));
    if !known {
        return Err(vec![conversion_problem(&cell, ProblemId::TYPE_VALUE_MISMATCH)
            .with("key", key)
            .with("structure", structure.name())]);
    }
    Ok(alloc.allocate(Arc::new(cell), Some(EvaluatedValue::Key(key.to_string()))))
}

fn conversion_problem(cell: &MemoryCell, id: ProblemId) -> Problem {
    augment(Problem::new(id, cell.best_source().cloned()), cell)
}

fn augment(problem: Problem, cell: &MemoryCell) -> Problem {
    let problem = problem
        .or_location(cell.best_source())
        .augment("type", cell.ty.name());
    match &cell.kind {
        CellKind::Constant { module, constant } => problem
            .augment("module", module.as_str())
            .augment("constant", constant.as_str()),
        CellKind::External { name } => problem.augment("name", name.as_str()),
        _ => problem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConstantMemory;
    use crate::test_support::{int_type, str_type};
    use crate::value::CallableValue;
    use cellvm_foundation::{BindHint, TypeRef};
    use std::ops::ControlFlow;

    fn registry(extra: &[Arc<VmType>]) -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.add_type(&int_type()).unwrap();
        reg.add_type(&str_type()).unwrap();
        for t in extra {
            reg.add_type(t).unwrap();
        }
        reg
    }

    fn constant_cell(ty: Arc<VmType>) -> MemoryCell {
        MemoryCell::constant("m", "c", ty)
    }

    #[test]
    fn natives_check_membership() {
        let reg = registry(&[]);
        let mut mem = ConstantMemory::default();
        let v = convert_constant(&mut mem, &reg, constant_cell(int_type()), &5_i64.into()).unwrap();
        assert_eq!(v.value().and_then(EvaluatedValue::as_int), Some(5));

        let errs = convert_constant(&mut mem, &reg, constant_cell(int_type()), &"five".into()).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].id, ProblemId::TYPE_VALUE_MISMATCH);
        assert_eq!(errs[0].param_str("module"), Some("m"));
        assert_eq!(errs[0].param_str("constant"), Some("c"));
    }

    #[test]
    fn lists_allocate_children_first() {
        let list = Arc::new(VmType::iterable("ints", int_type()));
        let reg = registry(&[Arc::clone(&list)]);
        let mut mem = ConstantMemory::default();
        let value = StoredConstantValue::List(vec![1_i64.into(), 2_i64.into(), 3_i64.into()]);
        let v = convert_constant(&mut mem, &reg, constant_cell(list), &value).unwrap();
        assert_eq!(v.index(), Some(3));
        assert_eq!(mem.len(), 4);
        let child = mem.get(1).unwrap();
        assert!(matches!(&child.cell().kind, CellKind::Constant { constant, .. } if constant == "c.1"));

        let mut seen = Vec::new();
        v.value().unwrap().as_iterable().unwrap().for_each(&mut |item, _| {
            seen.push(item.value().and_then(EvaluatedValue::as_int).unwrap());
            ControlFlow::Continue(())
        });
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn records_need_exactly_the_typed_keys() {
        let point = Arc::new(VmType::structured(
            "point",
            [("x", TypeRef::from(int_type())), ("y", TypeRef::from(int_type()))],
        ));
        let reg = registry(&[Arc::clone(&point)]);
        let mut mem = ConstantMemory::default();

        let ok = StoredConstantValue::record([("x", 1_i64.into()), ("y", 2_i64.into())]);
        let v = convert_constant(&mut mem, &reg, constant_cell(Arc::clone(&point)), &ok).unwrap();
        let s = v.value().unwrap().as_structured().unwrap();
        assert_eq!(s.keys(), vec!["x", "y"]);

        let bad = StoredConstantValue::record([("x", 1_i64.into()), ("z", 2_i64.into())]);
        let errs = convert_constant(&mut mem, &reg, constant_cell(point), &bad).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().any(|p| p.param_str("missing_key") == Some("y")));
        assert!(errs.iter().any(|p| p.param_str("unexpected_key") == Some("z")));
    }

    #[test]
    fn nested_errors_name_the_sub_cell() {
        let list = Arc::new(VmType::iterable("ints", int_type()));
        let reg = registry(&[Arc::clone(&list)]);
        let mut mem = ConstantMemory::default();
        let value = StoredConstantValue::List(vec![1_i64.into(), "two".into()]);
        let errs = convert_constant(&mut mem, &reg, constant_cell(list), &value).unwrap_err();
        assert_eq!(errs[0].param_str("constant"), Some("c.1"));
    }

    #[test]
    fn keys_must_exist_in_the_structure() {
        let point = Arc::new(VmType::structured("point", [("x", TypeRef::from(int_type()))]));
        let key = Arc::new(VmType::key_of("point-key", Arc::clone(&point)));
        let reg = registry(&[Arc::clone(&key)]);
        let mut mem = ConstantMemory::default();

        let v = convert_constant(&mut mem, &reg, constant_cell(Arc::clone(&key)), &StoredConstantValue::key("x"))
            .unwrap();
        assert_eq!(v.value().and_then(EvaluatedValue::as_key), Some("x"));
        let v = convert_constant(&mut mem, &reg, constant_cell(Arc::clone(&key)), &"x".into()).unwrap();
        assert_eq!(v.value().and_then(EvaluatedValue::as_key), Some("x"));

        let errs = convert_constant(&mut mem, &reg, constant_cell(key), &StoredConstantValue::key("q")).unwrap_err();
        assert_eq!(errs[0].param_str("key"), Some("q"));
    }

    #[test]
    fn generic_types_cannot_be_constants() {
        let reg = registry(&[]);
        let mut mem = ConstantMemory::default();
        let list = Arc::new(VmType::iterable("gen", TypeRef::generic("T", BindHint::Any)));
        let errs = convert_constant(&mut mem, &reg, constant_cell(list), &StoredConstantValue::List(vec![]))
            .unwrap_err();
        assert_eq!(errs[0].id, ProblemId::CONSTANT_GENERIC_TYPE);

        let f = Arc::new(VmType::callable("f", TypeRef::generic("S", BindHint::Structure), int_type()));
        let errs = convert_constant(&mut mem, &reg, constant_cell(f), &CallableValue::new([]).into()).unwrap_err();
        assert_eq!(errs[0].id, ProblemId::CONSTANT_GENERIC_TYPE);
    }

    #[test]
    fn shape_mismatch() {
        let reg = registry(&[]);
        let mut mem = ConstantMemory::default();
        let errs = convert_constant(
            &mut mem,
            &reg,
            constant_cell(int_type()),
            &StoredConstantValue::List(vec![]),
        )
        .unwrap_err();
        assert_eq!(errs[0].param_str("value_kind"), Some("list"));
        assert_eq!(errs[0].param_str("category"), Some("native"));
    }
}

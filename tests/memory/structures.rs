//! Integration tests for layered structures

use std::sync::Arc;

use cellvm_foundation::{ProblemId, TypeRef, TypeRegistry, VmType};
use cellvm_memory::{ConstantMemory, EvaluatedValue, LocalMemory, MemoryCell, MemoryFactory, MemoryValue};

use crate::{int_type, loose, str_type, text};

fn person() -> Arc<VmType> {
    Arc::new(VmType::structured(
        "person",
        [("name", TypeRef::from(str_type())), ("age", TypeRef::from(int_type()))],
    ))
}

fn memory() -> LocalMemory {
    let mut types = TypeRegistry::new();
    types.add_type(&person()).unwrap();
    let types = Arc::new(types);
    let constants = Arc::new(ConstantMemory::compile(&types, &[]).unwrap());
    LocalMemory::new(constants, types)
}

fn member(value: &EvaluatedValue, key: &str) -> MemoryValue {
    value.as_structured().unwrap().get(key).unwrap()
}

#[test]
fn updates_override_without_touching_the_base() {
    let memory = memory();
    let factory = MemoryFactory::new(&memory);
    let ty = person();

    let base = factory
        .structure()
        .from_values(
            [
                ("name".to_string(), EvaluatedValue::from("ada")),
                ("age".to_string(), EvaluatedValue::from(36_i64)),
            ],
            &ty,
        )
        .unwrap();
    let base_slot = memory.allocate(Arc::new(MemoryCell::external("base", Arc::clone(&ty))), Some(base.clone()));

    let older = factory
        .structure()
        .update_from_values(&base_slot, [("age".to_string(), EvaluatedValue::from(37_i64))], None)
        .unwrap();

    assert_eq!(member(&older, "age").value().and_then(EvaluatedValue::as_int), Some(37));
    assert_eq!(text(&member(&older, "name")), "ada");
    assert_eq!(member(&base, "age").value().and_then(EvaluatedValue::as_int), Some(36));
    assert_eq!(older.as_structured().unwrap().as_layered().unwrap().depth(), 2);
}

#[test]
fn members_are_type_checked() {
    let memory = memory();
    let factory = MemoryFactory::new(&memory);

    let err = factory
        .structure()
        .from_memory([("age".to_string(), loose("old", str_type()))], &person())
        .unwrap_err();
    assert_eq!(err.id, ProblemId::TYPE_MISMATCH);
    assert_eq!(err.param_str("key"), Some("age"));

    let err = factory
        .structure()
        .from_values([("height".to_string(), EvaluatedValue::from(180_i64))], &person())
        .unwrap_err();
    assert_eq!(err.param_str("unexpected_key"), Some("height"));
}

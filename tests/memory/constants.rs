//! Integration tests for constant memory

use std::sync::Arc;

use cellvm_foundation::{ProblemId, TypeRegistry, VmType};
use cellvm_memory::{ConstantMemory, ConstantValue, EvaluatedValue, Module, StoredConstantValue};

use crate::{int_type, str_type, text};

fn registry() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.add_type(&int_type()).unwrap();
    types.add_type(&str_type()).unwrap();
    types
}

#[test]
fn constants_are_addressable_by_module_and_name() {
    let ints = Arc::new(VmType::iterable("ints", int_type()));
    let mut types = registry();
    types.add_type(&ints).unwrap();
    let m = Module::new("m")
        .with_constant("one", ConstantValue::new(int_type(), 1_i64))
        .with_constant("hello", ConstantValue::new(str_type(), "hello"))
        .with_constant(
            "list",
            ConstantValue::new(ints, vec![StoredConstantValue::from(1_i64), StoredConstantValue::from(2_i64)]),
        );

    let memory = ConstantMemory::compile(&types, &[m]).unwrap();
    let one = memory.get(memory.lookup("m", "one").unwrap()).unwrap();
    assert_eq!(one.value().and_then(EvaluatedValue::as_int), Some(1));
    let hello = memory.get(memory.lookup("m", "hello").unwrap()).unwrap();
    assert_eq!(text(hello), "hello");
    let list = memory.get(memory.lookup("m", "list").unwrap()).unwrap();
    assert_eq!(list.value().and_then(EvaluatedValue::as_iterable).map(|l| l.size()), Some(2));
    assert!(memory.lookup("m", "two").is_none());
}

#[test]
fn compile_reports_every_problem() {
    let unregistered = Arc::new(VmType::iterable("strs", str_type()));
    let modules = [
        Module::new("m")
            .with_constant("bad-type", ConstantValue::new(unregistered, Vec::<StoredConstantValue>::new()))
            .with_constant("bad-value", ConstantValue::new(int_type(), "not an int")),
        Module::new("m"),
    ];
    let problems = ConstantMemory::compile(&registry(), &modules).unwrap_err();
    assert!(problems.contains(ProblemId::MISSING_DECLARED_TYPE));
    assert!(problems.contains(ProblemId::TYPE_VALUE_MISMATCH));
    assert!(problems.contains(ProblemId::DUPLICATE_MODULE_NAMES));
    assert_eq!(problems.len(), 3);
}

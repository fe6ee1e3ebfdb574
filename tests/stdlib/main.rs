//! Integration tests for Layer 3: standard opcodes
//!
//! Scripts built from the standard natives and opcodes, run end to end.

use std::collections::BTreeMap;
use std::sync::Arc;

use cellvm_foundation::{ProblemId, TypeRef, VmType};
use cellvm_memory::{CallableValue, ConstantValue, EvaluatedValue, MemoryCell, Module, StoredConstantValue};
use cellvm_stdlib::{
    OPCODE_ADD_NUMBERS, OPCODE_CONCAT_STRINGS, OPCODE_GET_KEY, OPCODE_LOAD_CONST, OPCODE_PEEK, OPCODE_SLICE, integer_type,
    number_type, standard_opcodes, standard_types, string_type,
};
use cellvm_vm::{Interpreter, create_script_loader};

fn int_list() -> Arc<VmType> {
    Arc::new(VmType::iterable("int-list", integer_type()))
}

/// A callable constant taking no arguments. Cell 1 is the empty record.
fn thunk(returns: Arc<VmType>, mut cells: Vec<(usize, MemoryCell)>) -> ConstantValue {
    let no_args = Arc::new(VmType::structured("no-args", Vec::<(String, TypeRef)>::new()));
    cells.push((1, MemoryCell::external("arguments", Arc::clone(&no_args))));
    let name = format!("{}-thunk", returns.name());
    let ty = Arc::new(VmType::callable(name, no_args, returns));
    ConstantValue::new(ty, CallableValue::new(cells))
}

fn int(module: &str, name: &str) -> MemoryCell {
    MemoryCell::constant(module, name, integer_type())
}

fn library() -> Module {
    let list = int_list();
    Module::new("lib")
        .with_constant("zero", ConstantValue::new(integer_type(), 0_i64))
        .with_constant("one", ConstantValue::new(integer_type(), 1_i64))
        .with_constant("two", ConstantValue::new(integer_type(), 2_i64))
        .with_constant("three", ConstantValue::new(integer_type(), 3_i64))
        .with_constant("ten", ConstantValue::new(integer_type(), 10_i64))
        .with_constant("minus-one", ConstantValue::new(integer_type(), -1_i64))
        .with_constant(
            "numbers",
            ConstantValue::new(
                Arc::clone(&list),
                vec![StoredConstantValue::from(1_i64), 2_i64.into(), 3_i64.into(), 4_i64.into()],
            ),
        )
        .with_constant("half", ConstantValue::new(number_type(), 1.5_f64))
        .with_constant("quarter", ConstantValue::new(number_type(), 2.25_f64))
        .with_constant("lib-name", ConstantValue::new(string_type(), "lib"))
        .with_constant("hello-name", ConstantValue::new(string_type(), "hello"))
        .with_constant("hello", ConstantValue::new(string_type(), "hello, "))
        .with_constant("world", ConstantValue::new(string_type(), "world"))
        .with_constant(
            "middle",
            thunk(
                Arc::clone(&list),
                vec![
                    (0, MemoryCell::opcode(OPCODE_SLICE, vec![2, 3, 4], Arc::clone(&list))),
                    (2, MemoryCell::constant("lib", "numbers", Arc::clone(&list))),
                    (3, int("lib", "one")),
                    (4, int("lib", "three")),
                ],
            ),
        )
        .with_constant(
            "all-but-last",
            thunk(
                Arc::clone(&list),
                vec![
                    (0, MemoryCell::opcode(OPCODE_SLICE, vec![2, 3, 4], Arc::clone(&list))),
                    (2, MemoryCell::constant("lib", "numbers", Arc::clone(&list))),
                    (3, int("lib", "zero")),
                    (4, int("lib", "minus-one")),
                ],
            ),
        )
        .with_constant(
            "second",
            thunk(
                integer_type(),
                vec![
                    (0, MemoryCell::opcode(OPCODE_PEEK, vec![2, 5], integer_type())),
                    (2, MemoryCell::opcode(OPCODE_SLICE, vec![3, 4, 6], Arc::clone(&list))),
                    (3, MemoryCell::constant("lib", "numbers", Arc::clone(&list))),
                    (4, int("lib", "one")),
                    (5, int("lib", "zero")),
                    (6, int("lib", "ten")),
                ],
            ),
        )
        .with_constant(
            "nothing-or-zero",
            thunk(
                integer_type(),
                vec![
                    (0, MemoryCell::opcode(OPCODE_PEEK, vec![2, 5], integer_type())),
                    (2, MemoryCell::opcode(OPCODE_SLICE, vec![3, 4, 4], Arc::clone(&list))),
                    (3, MemoryCell::constant("lib", "numbers", Arc::clone(&list))),
                    (4, int("lib", "two")),
                    (5, int("lib", "zero")),
                ],
            ),
        )
        .with_constant(
            "greeting",
            thunk(
                string_type(),
                vec![
                    (0, MemoryCell::opcode(OPCODE_CONCAT_STRINGS, vec![2, 3], string_type())),
                    (2, MemoryCell::opcode(OPCODE_LOAD_CONST, vec![4, 5], string_type())),
                    (3, MemoryCell::constant("lib", "world", string_type())),
                    (4, MemoryCell::constant("lib", "lib-name", string_type())),
                    (5, MemoryCell::constant("lib", "hello-name", string_type())),
                ],
            ),
        )
        .with_constant(
            "total",
            thunk(
                number_type(),
                vec![
                    (0, MemoryCell::opcode(OPCODE_ADD_NUMBERS, vec![2, 3], number_type())),
                    (2, MemoryCell::constant("lib", "half", number_type())),
                    (3, MemoryCell::constant("lib", "quarter", number_type())),
                ],
            ),
        )
}

fn load(modules: Vec<Module>) -> Interpreter {
    create_script_loader(standard_opcodes(), standard_types())
        .unwrap()
        .parse_script(modules)
        .unwrap()
}

fn run(name: &str) -> EvaluatedValue {
    load(vec![library()]).run_function("lib", name, BTreeMap::new()).unwrap()
}

fn items(value: &EvaluatedValue) -> Vec<i64> {
    value
        .as_iterable()
        .unwrap()
        .to_vec()
        .iter()
        .filter_map(|v| v.value().and_then(EvaluatedValue::as_int))
        .collect()
}

#[test]
fn slices_ranges() {
    assert_eq!(items(&run("middle")), vec![2, 3]);
    assert_eq!(items(&run("all-but-last")), vec![1, 2, 3]);
}

#[test]
fn peeks_into_slices() {
    assert_eq!(run("second").as_int(), Some(2));
    assert_eq!(run("nothing-or-zero").as_int(), Some(0));
}

#[test]
fn concatenates_loaded_constants() {
    assert_eq!(run("greeting").as_str(), Some("hello, world"));
}

#[test]
fn adds_numbers() {
    assert_eq!(run("total").as_number(), Some(3.75));
}

#[test]
fn loads_members_of_constant_records() {
    let point = Arc::new(VmType::structured(
        "point",
        [("x", TypeRef::from(integer_type())), ("y", TypeRef::from(integer_type()))],
    ));
    let point_key = Arc::new(VmType::key_of("point-key", Arc::clone(&point)));
    let m = Module::new("geo")
        .with_constant(
            "origin-ish",
            ConstantValue::new(
                Arc::clone(&point),
                StoredConstantValue::record([("x", 1_i64.into()), ("y", 7_i64.into())]),
            ),
        )
        .with_constant("y", ConstantValue::new(Arc::clone(&point_key), StoredConstantValue::key("y")))
        .with_constant(
            "height",
            thunk(
                integer_type(),
                vec![
                    (0, MemoryCell::opcode(OPCODE_GET_KEY, vec![2, 3], integer_type())),
                    (2, MemoryCell::constant("geo", "origin-ish", point)),
                    (3, MemoryCell::constant("geo", "y", point_key)),
                ],
            ),
        );
    let value = load(vec![m]).run_function("geo", "height", BTreeMap::new()).unwrap();
    assert_eq!(value.as_int(), Some(7));
}

#[test]
fn loaded_constants_are_checked_against_their_cell() {
    let m = Module::new("m")
        .with_constant("m-name", ConstantValue::new(string_type(), "m"))
        .with_constant("one-name", ConstantValue::new(string_type(), "one"))
        .with_constant("one", ConstantValue::new(integer_type(), 1_i64))
        .with_constant(
            "wrong",
            thunk(
                string_type(),
                vec![
                    (0, MemoryCell::opcode(OPCODE_LOAD_CONST, vec![2, 3], string_type())),
                    (2, MemoryCell::constant("m", "m-name", string_type())),
                    (3, MemoryCell::constant("m", "one-name", string_type())),
                ],
            ),
        );
    let problems = create_script_loader(standard_opcodes(), standard_types())
        .unwrap()
        .parse_script(vec![m])
        .unwrap_err();
    assert!(problems.contains(ProblemId::TYPE_MISMATCH), "{problems:?}");
}

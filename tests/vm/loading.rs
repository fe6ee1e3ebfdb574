//! Integration tests for script loading

use std::sync::Arc;

use cellvm_foundation::{ProblemId, VmType};
use cellvm_memory::{ConstantValue, MemoryCell, Module};
use cellvm_vm::{InterpreterConfig, create_script_loader};

use crate::{Add, int_type, no_arguments, opcodes, thunk};

fn load_one() -> Module {
    Module::new("m")
        .with_constant("one", ConstantValue::new(int_type(), 1_i64))
        .with_constant("load-one", thunk(vec![(0, MemoryCell::constant("m", "one", int_type()))]))
}

#[test]
fn load_one_end_to_end() {
    let interpreter = create_script_loader(vec![Arc::new(Add::new())], vec![int_type()])
        .unwrap()
        .parse_script(vec![load_one()])
        .unwrap();
    let value = interpreter.run_function("m", "load-one", no_arguments()).unwrap();
    assert_eq!(value.as_int(), Some(1));
}

#[test]
fn declaration_problems_are_reported_together() {
    let problems = create_script_loader(
        vec![Arc::new(Add::new()), Arc::new(Add::new())],
        vec![Arc::new(VmType::iterable("ints", int_type()))],
    )
    .unwrap_err();
    assert!(problems.contains(ProblemId::DUPLICATE_OPCODES));
    assert!(problems.contains(ProblemId::UNKNOWN_TYPE_CATEGORY));
    assert!(problems.contains(ProblemId::MISSING_NATIVE_TYPE));
}

#[test]
fn every_broken_function_is_reported_at_load() {
    let m = Module::new("m")
        .with_constant("one", ConstantValue::new(int_type(), 1_i64))
        .with_constant("f", thunk(vec![(0, MemoryCell::opcode("nope", vec![], int_type()))]))
        .with_constant("g", thunk(vec![(0, MemoryCell::constant("m", "missing", int_type()))]))
        .with_constant("h", thunk(vec![(0, MemoryCell::opcode("add", vec![2], int_type()))]));
    let problems = create_script_loader(opcodes(), vec![int_type()])
        .unwrap()
        .parse_script(vec![m])
        .unwrap_err();

    assert!(problems.contains(ProblemId::UNKNOWN_OPCODE));
    assert!(problems.contains(ProblemId::NO_SUCH_CONSTANT));
    assert!(problems.contains(ProblemId::ARGUMENT_COUNT));
    let functions: Vec<&str> = problems.as_slice().iter().filter_map(|p| p.param_str("constant")).collect();
    // The missing reference keeps its own name over the function's.
    for name in ["f", "missing", "h"] {
        assert!(functions.contains(&name), "no problem names {name}: {problems:?}");
    }
}

#[test]
fn lazy_compilation_defers_to_the_first_run() {
    let m = Module::new("m").with_constant("f", thunk(vec![(0, MemoryCell::opcode("nope", vec![], int_type()))]));
    let interpreter = create_script_loader(opcodes(), vec![int_type()])
        .unwrap()
        .with_config(InterpreterConfig::default().with_eager_compile(false))
        .parse_script(vec![m])
        .unwrap();
    let problem = interpreter.run_function("m", "f", no_arguments()).unwrap_err();
    assert_eq!(problem.id, ProblemId::UNKNOWN_OPCODE);
}

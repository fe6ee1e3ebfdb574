//! Integration tests for runtime errors

use std::sync::{Arc, Mutex};

use cellvm_foundation::{Problem, ProblemId};
use cellvm_memory::{ConstantValue, MemoryCell, Module};
use cellvm_vm::{DebuggerCallbacks, Interpreter, create_script_loader};

use crate::{int_type, no_arguments, opcodes, thunk};

fn interpreter() -> Interpreter {
    let m = Module::new("m")
        .with_constant("one", ConstantValue::new(int_type(), 1_i64))
        .with_constant("two", ConstantValue::new(int_type(), 2_i64))
        .with_constant(
            "double-fault",
            thunk(vec![
                (0, MemoryCell::opcode("add", vec![2, 3], int_type())),
                (2, MemoryCell::opcode("boom", vec![4], int_type())),
                (3, MemoryCell::opcode("boom", vec![5], int_type())),
                (4, MemoryCell::constant("m", "one", int_type())),
                (5, MemoryCell::constant("m", "two", int_type())),
            ]),
        );
    create_script_loader(opcodes(), vec![int_type()])
        .unwrap()
        .parse_script(vec![m])
        .unwrap()
}

#[test]
fn unknown_functions_are_error_values() {
    let interpreter = interpreter();
    let problem = interpreter.run_function("nowhere", "f", no_arguments()).unwrap_err();
    assert_eq!(problem.id, ProblemId::NO_SUCH_CONSTANT);
    assert_eq!(problem.param_str("module"), Some("nowhere"));
    assert_eq!(problem.param_str("constant"), Some("f"));

    let problem = interpreter.run_function("m", "nothing", no_arguments()).unwrap_err();
    assert_eq!(problem.id, ProblemId::NO_SUCH_CONSTANT);
    assert_eq!(problem.param_str("constant"), Some("nothing"));
}

#[test]
fn first_failed_dependency_wins() {
    let problem = interpreter().run_function("m", "double-fault", no_arguments()).unwrap_err();
    assert_eq!(problem.id, ProblemId::ARGUMENT_VALUE);
    assert_eq!(problem.param_num("tag"), Some(1.0));
    assert_eq!(problem.param_str("opcode"), Some("boom"));
    assert_eq!(problem.param_num("additional_errors"), Some(1.0));
}

#[derive(Default)]
struct Errors(Mutex<Vec<ProblemId>>);

impl DebuggerCallbacks for Errors {
    fn generated_error(&self, problem: &Problem) {
        self.0.lock().unwrap().push(problem.id);
    }
}

#[test]
fn debugger_hears_each_failed_run_once() {
    let interpreter = interpreter();
    let errors = Arc::new(Errors::default());
    interpreter.set_debugger(Arc::clone(&errors) as Arc<dyn DebuggerCallbacks>).unwrap();
    let again = interpreter.set_debugger(Arc::new(Errors::default())).unwrap_err();
    assert_eq!(again.id, ProblemId::DEBUGGER_ALREADY_SET);

    let _ = interpreter.run_function("m", "double-fault", no_arguments());
    let _ = interpreter.run_function("m", "nothing", no_arguments());
    let seen = errors.0.lock().unwrap().clone();
    assert_eq!(seen, vec![ProblemId::ARGUMENT_VALUE, ProblemId::NO_SUCH_CONSTANT]);
}

//! Integration tests for running functions

use std::sync::Arc;
use std::thread;

use cellvm_memory::{ConstantValue, MemoryCell, Module};
use cellvm_vm::{CancellationToken, Interpreter, InterpreterConfig, create_script_loader};

use cellvm_foundation::ProblemId;

use crate::{int_type, no_arguments, opcodes, thunk};

/// `m/three` = 1 + 2, `m/chain` adds one a few thousand times.
fn interpreter(config: InterpreterConfig) -> Interpreter {
    let mut chain = vec![(2, MemoryCell::constant("m", "one", int_type()))];
    let links = 5000;
    for i in 0..links {
        let at = if i == 0 { 0 } else { i + 2 };
        let next = if i == links - 1 { 2 } else { i + 3 };
        chain.push((at, MemoryCell::opcode("add", vec![next, 2], int_type())));
    }
    let m = Module::new("m")
        .with_constant("one", ConstantValue::new(int_type(), 1_i64))
        .with_constant("two", ConstantValue::new(int_type(), 2_i64))
        .with_constant(
            "three",
            thunk(vec![
                (0, MemoryCell::opcode("add", vec![2, 3], int_type())),
                (2, MemoryCell::constant("m", "one", int_type())),
                (3, MemoryCell::constant("m", "two", int_type())),
            ]),
        )
        .with_constant("chain", thunk(chain));
    create_script_loader(opcodes(), vec![int_type()])
        .unwrap()
        .with_config(config)
        .parse_script(vec![m])
        .unwrap()
}

#[test]
fn runs_and_reruns() {
    let interpreter = interpreter(InterpreterConfig::default());
    for _ in 0..3 {
        let value = interpreter.run_function("m", "three", no_arguments()).unwrap();
        assert_eq!(value.as_int(), Some(3));
    }
}

#[test]
fn deep_graphs_run_without_recursion() {
    let value = interpreter(InterpreterConfig::permissive())
        .run_function("m", "chain", no_arguments())
        .unwrap();
    assert_eq!(value.as_int(), Some(5001));
}

#[test]
fn step_budget_stops_long_runs() {
    let problem = interpreter(InterpreterConfig::default().with_max_steps(Some(100)))
        .run_function("m", "chain", no_arguments())
        .unwrap_err();
    assert_eq!(problem.id, ProblemId::STEP_LIMIT_EXCEEDED);
}

#[test]
fn cancelled_tokens_stop_runs() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let problem = interpreter(InterpreterConfig::default())
        .run_function_with("m", "chain", no_arguments(), &cancel)
        .unwrap_err();
    assert_eq!(problem.id, ProblemId::CANCELLED);
}

#[test]
fn concurrent_runs_share_one_interpreter() {
    let interpreter = Arc::new(interpreter(InterpreterConfig::default()));
    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let interpreter = Arc::clone(&interpreter);
                scope.spawn(move || interpreter.run_function("m", "three", no_arguments()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap().as_int(), Some(3));
        }
    });
}

//! Full-stack integration tests
//!
//! Standard opcodes, nested function calls and debuggers working together.

use std::collections::BTreeMap;
use std::sync::Arc;

use cellvm::debug::{DebugConfig, DebugEvent, RecordingDebugger, TracingDebugger};
use cellvm::foundation::{ProblemId, TypeRef, VmType};
use cellvm::memory::{CallableValue, ConstantValue, MemoryCell, Module, StoredConstantValue};
use cellvm::stdlib::{OPCODE_ADD_INTEGERS, OPCODE_GET_KEY, integer_type, standard_opcodes, standard_types};
use cellvm::vm::{DebuggerCallbacks, Interpreter, InterpreterConfig, create_script_loader};

/// `calc/main {x}` calls `calc/add-pair {a: x, b: 32}`.
fn calculator() -> Module {
    let pair = Arc::new(VmType::structured(
        "pair",
        [("a", TypeRef::from(integer_type())), ("b", TypeRef::from(integer_type()))],
    ));
    let pair_key = Arc::new(VmType::key_of("pair-key", Arc::clone(&pair)));
    let pair_fn = Arc::new(VmType::callable("pair-fn", Arc::clone(&pair), integer_type()));
    let args = Arc::new(VmType::structured("main-args", [("x", TypeRef::from(integer_type()))]));
    let args_key = Arc::new(VmType::key_of("main-args-key", Arc::clone(&args)));
    let main_fn = Arc::new(VmType::callable("main-fn", Arc::clone(&args), integer_type()));

    Module::new("calc")
        .with_constant("a", ConstantValue::new(Arc::clone(&pair_key), StoredConstantValue::key("a")))
        .with_constant("b", ConstantValue::new(Arc::clone(&pair_key), StoredConstantValue::key("b")))
        .with_constant("x", ConstantValue::new(Arc::clone(&args_key), StoredConstantValue::key("x")))
        .with_constant("thirty-two", ConstantValue::new(integer_type(), 32_i64))
        .with_constant(
            "add-pair",
            ConstantValue::new(
                Arc::clone(&pair_fn),
                CallableValue::new(vec![
                    (0, MemoryCell::opcode(OPCODE_ADD_INTEGERS, vec![3, 5], integer_type())),
                    (1, MemoryCell::external("pair", Arc::clone(&pair))),
                    (2, MemoryCell::constant("calc", "a", Arc::clone(&pair_key))),
                    (3, MemoryCell::opcode(OPCODE_GET_KEY, vec![1, 2], integer_type())),
                    (4, MemoryCell::constant("calc", "b", Arc::clone(&pair_key))),
                    (5, MemoryCell::opcode(OPCODE_GET_KEY, vec![1, 4], integer_type())),
                ]),
            ),
        )
        .with_constant(
            "main",
            ConstantValue::new(
                main_fn,
                CallableValue::new(vec![
                    (0, MemoryCell::calling(2, 3, integer_type())),
                    (1, MemoryCell::external("args", Arc::clone(&args))),
                    (2, MemoryCell::constant("calc", "add-pair", pair_fn)),
                    (3, MemoryCell::structured([("a", 4), ("b", 5)], pair)),
                    (4, MemoryCell::opcode(OPCODE_GET_KEY, vec![1, 6], integer_type())),
                    (5, MemoryCell::constant("calc", "thirty-two", integer_type())),
                    (6, MemoryCell::constant("calc", "x", args_key)),
                ]),
            ),
        )
}

fn interpreter(config: InterpreterConfig) -> Interpreter {
    create_script_loader(standard_opcodes(), standard_types())
        .unwrap()
        .with_config(config)
        .parse_script(vec![calculator()])
        .unwrap()
}

fn x(value: i64) -> BTreeMap<String, StoredConstantValue> {
    BTreeMap::from([("x".to_string(), StoredConstantValue::from(value))])
}

#[test]
fn nested_calls_return_through_the_stack() {
    for config in [InterpreterConfig::default(), InterpreterConfig::strict(), InterpreterConfig::permissive()] {
        let value = interpreter(config).run_function("calc", "main", x(13)).unwrap();
        assert_eq!(value.as_int(), Some(45));
    }
}

#[test]
fn recording_debugger_sees_the_call_tree() {
    let interpreter = interpreter(InterpreterConfig::default());
    let recorder = Arc::new(RecordingDebugger::default());
    interpreter
        .set_debugger(Arc::clone(&recorder) as Arc<dyn DebuggerCallbacks>)
        .unwrap();

    interpreter.run_function("calc", "main", x(1)).unwrap();
    assert_eq!(
        recorder.event_types(),
        vec!["function-started", "function-started", "function-returned", "function-returned"]
    );
    let depths: Vec<usize> = recorder.records().iter().map(|r| r.depth).collect();
    assert_eq!(depths, vec![0, 1, 1, 0]);
    assert!(recorder.errors().is_empty());
}

#[test]
fn recording_debugger_keeps_opcode_events_on_request() {
    let interpreter = interpreter(InterpreterConfig::default());
    let recorder = Arc::new(RecordingDebugger::new(DebugConfig::verbose()));
    interpreter
        .set_debugger(Arc::clone(&recorder) as Arc<dyn DebuggerCallbacks>)
        .unwrap();

    interpreter.run_function("calc", "main", x(1)).unwrap();
    let resolved: Vec<String> = recorder
        .records()
        .into_iter()
        .filter_map(|r| match r.event {
            DebugEvent::OpcodeResolved { opcode, .. } => Some(opcode),
            _ => None,
        })
        .collect();
    assert!(resolved.iter().any(|o| o == OPCODE_ADD_INTEGERS), "{resolved:?}");
    assert!(resolved.iter().any(|o| o == OPCODE_GET_KEY), "{resolved:?}");
}

#[test]
fn failed_runs_are_recorded_once() {
    let interpreter = interpreter(InterpreterConfig::default());
    let recorder = Arc::new(RecordingDebugger::default());
    interpreter
        .set_debugger(Arc::clone(&recorder) as Arc<dyn DebuggerCallbacks>)
        .unwrap();

    let problem = interpreter.run_function("calc", "main", BTreeMap::new()).unwrap_err();
    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].id, problem.id);

    let problem = interpreter.run_function("calc", "missing", x(1)).unwrap_err();
    assert_eq!(problem.id, ProblemId::NO_SUCH_CONSTANT);
    assert_eq!(recorder.errors().len(), 2);
}

#[test]
fn tracing_debugger_can_be_installed() {
    let interpreter = interpreter(InterpreterConfig::default());
    interpreter
        .set_debugger(Arc::new(TracingDebugger::new(DebugConfig::verbose())))
        .unwrap();
    let again = interpreter.set_debugger(Arc::new(RecordingDebugger::default())).unwrap_err();
    assert_eq!(again.id, ProblemId::DEBUGGER_ALREADY_SET);
    assert_eq!(interpreter.run_function("calc", "main", x(2)).unwrap().as_int(), Some(34));
}

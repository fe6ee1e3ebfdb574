//! The evaluation engine.
//!
//! Evaluation is driven by an explicit worklist instead of the host stack,
//! so script recursion depth is bounded by heap memory only. Work is
//! expressed as [`RuntimeAction`]s: a list of dependency actions plus a
//! continuation that receives their results. A continuation either
//! finishes with a value, fails, or hands back another action.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use cellvm_foundation::{Problem, ProblemId, Result, SourcePosition, TypeRegistry, VmType, first_error_wins};
use cellvm_memory::{
    CallableValue, CellKind, EvaluatedValue, LayeredStructured, LocalMemory, MemoryCell,
    MemoryFactory, MemoryIndex, MemoryStore, MemoryValue, SpliceNode,
};
use tracing::trace;

use crate::cancel::CancellationToken;
use crate::compiler::{CallCompiler, CompiledCall, NodeOp};
use crate::config::{InterpreterConfig, ReduceStrategy};
use crate::debugger::DebuggerCallbacks;
use crate::opcode::{BoundTypes, EvaluationKind, Opcode, OpcodeFrame, OpcodeResult, ReducerValue};

/// Continuation run once an action's dependencies have produced values.
pub type Compute = Box<dyn FnOnce(&Runtime<'_>, Vec<MemoryValue>) -> Step>;

// =============================================================================
// Actions
// =============================================================================

/// How far to evaluate a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Depth {
    /// Until the value itself is known. Container members may stay lazy.
    Shallow,
    /// Until every reachable member is known.
    Deep,
}

/// The outcome of one continuation.
#[derive(Debug)]
pub enum Step {
    /// The action produced this value.
    Value(MemoryValue),
    /// The action failed.
    Error(Problem),
    /// The action continues with more work.
    Action(RuntimeAction),
}

/// A unit of deferred work.
pub struct RuntimeAction {
    dependencies: Vec<RuntimeAction>,
    compute: Compute,
}

impl fmt::Debug for RuntimeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeAction")
            .field("dependencies", &self.dependencies.len())
            .finish_non_exhaustive()
    }
}

impl RuntimeAction {
    /// An action that runs `compute` with the values of `dependencies`, in
    /// order.
    #[must_use]
    pub fn new(
        dependencies: Vec<RuntimeAction>,
        compute: impl FnOnce(&Runtime<'_>, Vec<MemoryValue>) -> Step + 'static,
    ) -> Self {
        Self {
            dependencies,
            compute: Box::new(compute),
        }
    }

    /// An action that produces `value` as it is.
    #[must_use]
    pub fn value(value: MemoryValue) -> Self {
        Self::new(Vec::new(), move |_, _| Step::Value(value))
    }

    /// An action that evaluates `value` to the given depth.
    #[must_use]
    pub fn evaluate(value: MemoryValue, depth: Depth) -> Self {
        Self::new(Vec::new(), move |rt, _| rt.force(value, depth))
    }

    /// Runs `next` with this action's value.
    #[must_use]
    pub fn then(self, next: impl FnOnce(&Runtime<'_>, MemoryValue) -> Step + 'static) -> Self {
        Self::new(vec![self], move |rt, mut results| match results.pop() {
            Some(value) => next(rt, value),
            None => Step::Error(order_violation("missing dependency result")),
        })
    }

    /// Number of dependencies.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }
}

fn order_violation(reason: &str) -> Problem {
    Problem::new(ProblemId::INSTRUCTION_ORDER_VIOLATION, None).with("reason", reason)
}

/// Copies the value `produced` holds into `target`.
fn settle(target: &MemoryValue, produced: &MemoryValue) -> Step {
    if target.ptr_eq(produced) && target.is_evaluated() {
        return Step::Value(target.clone());
    }
    match produced.value() {
        Some(value) => {
            target.memoize(value.clone());
            Step::Value(target.clone())
        }
        None => Step::Error(
            Problem::new(ProblemId::NON_EVALUATED_VALUE, produced.source().cloned())
                .with("type", produced.ty().name()),
        ),
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// One instantiation of a compiled call.
pub(crate) struct Activation {
    call: Arc<CompiledCall>,
    slots: BTreeMap<MemoryIndex, MemoryValue>,
}

impl Activation {
    pub(crate) fn new(call: Arc<CompiledCall>, slots: BTreeMap<MemoryIndex, MemoryValue>) -> Self {
        Self { call, slots }
    }
}

#[derive(Clone)]
struct Pending {
    activation: Rc<Activation>,
    node: MemoryIndex,
}

/// State shared by every action of one run.
pub struct Runtime<'a> {
    memory: &'a LocalMemory,
    compiler: &'a CallCompiler,
    debugger: &'a dyn DebuggerCallbacks,
    config: &'a InterpreterConfig,
    cancel: &'a CancellationToken,
    resolver: RefCell<HashMap<MemoryIndex, Pending>>,
    steps: Cell<u64>,
}

impl fmt::Debug for Runtime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("local", &self.memory.local_len())
            .field("pending", &self.resolver.borrow().len())
            .field("steps", &self.steps.get())
            .finish_non_exhaustive()
    }
}

impl<'a> Runtime<'a> {
    /// Creates the runtime for one run over `memory`.
    #[must_use]
    pub fn new(
        memory: &'a LocalMemory,
        compiler: &'a CallCompiler,
        debugger: &'a dyn DebuggerCallbacks,
        config: &'a InterpreterConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            memory,
            compiler,
            debugger,
            config,
            cancel,
            resolver: RefCell::new(HashMap::new()),
            steps: Cell::new(0),
        }
    }

    /// The run's local memory.
    #[must_use]
    pub const fn memory(&self) -> &'a LocalMemory {
        self.memory
    }

    /// The type registry.
    #[must_use]
    pub fn types(&self) -> &'a TypeRegistry {
        self.memory.types()
    }

    /// Steps taken so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// Makes the computed cells of an activation resolvable by memory index.
    pub(crate) fn register(&self, activation: Activation) {
        let activation = Rc::new(activation);
        let mut resolver = self.resolver.borrow_mut();
        for (&node, compiled) in &activation.call.nodes {
            if matches!(compiled.op, NodeOp::Argument | NodeOp::Constant(_)) {
                continue;
            }
            if let Some(index) = activation.slots.get(&node).and_then(MemoryValue::index) {
                resolver.insert(
                    index,
                    Pending {
                        activation: Rc::clone(&activation),
                        node,
                    },
                );
            }
        }
    }

    // =========================================================================
    // Driving
    // =========================================================================

    /// Runs an action to completion.
    ///
    /// # Errors
    ///
    /// The first error any action produced, `CANCELLED` once the token is
    /// cancelled, or `STEP_LIMIT_EXCEEDED` past the configured budget.
    pub fn execute(&self, root: RuntimeAction) -> Result<MemoryValue> {
        let mut stack = vec![Frame::new(root)];
        loop {
            if self.cancel.is_cancelled() {
                return Err(Problem::new(ProblemId::CANCELLED, None).with("steps", self.steps.get()));
            }
            let taken = self.steps.get() + 1;
            self.steps.set(taken);
            if let Some(limit) = self.config.max_steps {
                if taken > limit {
                    return Err(Problem::new(ProblemId::STEP_LIMIT_EXCEEDED, None).with("limit", limit));
                }
            }

            let Some(top) = stack.last_mut() else {
                return Err(order_violation("empty worklist"));
            };
            if let Some(next) = top.pending.pop() {
                stack.push(Frame::new(next));
                continue;
            }
            let Some(frame) = stack.pop() else {
                return Err(order_violation("empty worklist"));
            };
            match frame.finish(self) {
                Step::Action(next) => stack.push(Frame::new(next)),
                Step::Value(value) => match stack.last_mut() {
                    Some(parent) => parent.results.push(value),
                    None => {
                        trace!(steps = taken, "run finished");
                        return Ok(value);
                    }
                },
                // Siblings still run; `Frame::finish` counts every failure.
                Step::Error(problem) => match stack.last_mut() {
                    Some(parent) => parent.errors.push(problem),
                    None => return Err(problem),
                },
            }
        }
    }

    /// Evaluates a value to the given depth.
    pub fn force(&self, value: MemoryValue, depth: Depth) -> Step {
        if value.is_evaluated() {
            return match depth {
                Depth::Shallow => Step::Value(value),
                Depth::Deep => self.deep(value),
            };
        }
        let action = match self.resolve(&value) {
            Ok(action) => action,
            Err(problem) => return Step::Error(problem),
        };
        let target = value;
        let settled = action.then(move |_, produced| settle(&target, &produced));
        Step::Action(match depth {
            Depth::Shallow => settled,
            Depth::Deep => settled.then(|rt, v| rt.force(v, Depth::Deep)),
        })
    }

    fn deep(&self, value: MemoryValue) -> Step {
        let members = match value.value() {
            Some(EvaluatedValue::Iterable(it)) => it.to_vec(),
            Some(EvaluatedValue::Structured(s)) => s.keys().iter().filter_map(|k| s.get(k)).collect(),
            _ => return Step::Value(value),
        };
        let pending: Vec<RuntimeAction> = members
            .into_iter()
            .filter(|m| {
                !m.is_evaluated()
                    || matches!(m.value(), Some(EvaluatedValue::Iterable(_) | EvaluatedValue::Structured(_)))
            })
            .map(|m| RuntimeAction::evaluate(m, Depth::Deep))
            .collect();
        if pending.is_empty() {
            return Step::Value(value);
        }
        Step::Action(RuntimeAction::new(pending, move |_, _| Step::Value(value)))
    }

    fn resolve(&self, value: &MemoryValue) -> Result<RuntimeAction> {
        let unevaluated = || {
            Problem::new(ProblemId::NON_EVALUATED_VALUE, value.source().cloned())
                .with("type", value.ty().name())
                .with("kind", value.cell().kind.as_str())
        };
        let Some(index) = value.index() else {
            return Err(unevaluated());
        };
        let pending = self.resolver.borrow().get(&index).cloned();
        if let Some(pending) = pending {
            return self.node_action(&pending);
        }
        let CellKind::Calling { callable, argument } = &value.cell().kind else {
            return Err(unevaluated());
        };
        let corrupt = |at: MemoryIndex| {
            Problem::new(ProblemId::STRUCTURE_CORRUPT, value.source().cloned())
                .with("reason", "call refers to missing memory")
                .with("index", at)
        };
        let function = self.memory.value_at(*callable).ok_or_else(|| corrupt(*callable))?;
        let argument = self.memory.value_at(*argument).ok_or_else(|| corrupt(*argument))?;
        let target = value.clone();
        Ok(RuntimeAction::evaluate(function, Depth::Shallow)
            .then(move |rt, function| rt.call_step(&function, argument, target)))
    }

    fn node_action(&self, pending: &Pending) -> Result<RuntimeAction> {
        let activation = &pending.activation;
        let corrupt = || {
            Problem::new(ProblemId::STRUCTURE_CORRUPT, activation.call.callable().source.clone())
                .with("reason", "unknown compiled cell")
                .with("cell", pending.node)
        };
        let node = activation.call.nodes.get(&pending.node).ok_or_else(corrupt)?;
        let slot = activation.slots.get(&pending.node).cloned().ok_or_else(corrupt)?;
        let slot_of = |i: &MemoryIndex| activation.slots.get(i).cloned().ok_or_else(corrupt);

        match &node.op {
            NodeOp::Argument | NodeOp::Constant(_) => Ok(RuntimeAction::value(slot)),
            NodeOp::Structured(members) => {
                let entries = members
                    .iter()
                    .map(|(k, i)| -> Result<(String, MemoryValue)> { Ok((k.clone(), slot_of(i)?)) })
                    .collect::<Result<Vec<_>>>()?;
                let value = LayeredStructured::new(entries, Arc::clone(&node.cell.ty));
                slot.memoize(EvaluatedValue::Structured(Arc::new(value)));
                Ok(RuntimeAction::value(slot))
            }
            NodeOp::Iterable(members) => {
                let values = members.iter().map(slot_of).collect::<Result<Vec<_>>>()?;
                slot.memoize(EvaluatedValue::Iterable(Arc::new(SpliceNode::from_values(values))));
                Ok(RuntimeAction::value(slot))
            }
            NodeOp::Opcode {
                opcode,
                arguments,
                bound,
            } => {
                let args = arguments.iter().map(slot_of).collect::<Result<Vec<_>>>()?;
                Ok(opcode_action(Invocation {
                    opcode: Arc::clone(opcode),
                    args,
                    bound: bound.clone(),
                    cell: Arc::clone(&node.cell),
                    function: Some(Arc::clone(activation.call.callable())),
                    index: pending.node,
                    target: slot,
                }))
            }
            NodeOp::Calling { callable, argument } => {
                let function = slot_of(callable)?;
                let argument = slot_of(argument)?;
                Ok(RuntimeAction::evaluate(function, Depth::Shallow)
                    .then(move |rt, function| rt.call_step(&function, argument, slot)))
            }
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn call_step(&self, function: &MemoryValue, argument: MemoryValue, target: MemoryValue) -> Step {
        let parent = self.memory.parent();
        let compiled = match function.index() {
            Some(index) if index < parent.len() => self.compiler.compile(parent, index),
            _ => self.compiler.compile_value(parent, function),
        };
        let compiled = match compiled {
            Ok(compiled) => compiled,
            Err(problems) => {
                return Step::Error(first_error_wins(problems).unwrap_or_else(|| {
                    Problem::new(ProblemId::NOT_CALLABLE, function.source().cloned())
                }));
            }
        };
        let action = match compiled.construct_call(self, argument) {
            Ok(action) => action,
            Err(problem) => return Step::Error(problem),
        };
        let callable = Arc::clone(compiled.callable());
        self.debugger.function_started(&callable);
        Step::Action(action.then(move |rt, returned| {
            let step = settle(&target, &returned);
            if let Step::Value(value) = &step {
                rt.debugger.function_returned(&callable, value);
            }
            step
        }))
    }

    // =========================================================================
    // Opcodes
    // =========================================================================

    fn invoke(&self, inv: Invocation) -> Step {
        let sig = inv.opcode.signature();
        for (position, (decl, arg)) in sig.arguments.iter().zip(&inv.args).enumerate() {
            if decl.evaluation != EvaluationKind::Lazy && !arg.is_evaluated() {
                return Step::Error(
                    order_violation("argument not evaluated")
                        .with("opcode", inv.opcode.mnemonic())
                        .with("argIndex", position)
                        .or_location(inv.cell.best_source()),
                );
            }
        }
        let frame = OpcodeFrame {
            source: inv.cell.best_source().cloned(),
            context: self.compiler.context(),
            args: inv.args.clone(),
            return_type: Arc::clone(&inv.cell.ty),
            bound_types: inv.bound.clone(),
        };
        self.debugger
            .opcode_evaluation_start(inv.function.as_deref(), inv.index, &inv.cell);

        if self.config.runtime_validation {
            if let Some(problem) = first_error_wins(inv.opcode.runtime_validation(&frame)) {
                return inv.fail(problem);
            }
        }
        let factory = MemoryFactory::new(self.memory);
        match inv.opcode.evaluate(&frame, &factory) {
            OpcodeResult::Value(value) => {
                if self.config.validate_returns {
                    if let Some(problem) = first_error_wins(inv.opcode.return_validation(&frame, &value)) {
                        return inv.fail(problem);
                    }
                }
                inv.target.memoize(value);
                inv.resolved(self);
                Step::Value(inv.target)
            }
            OpcodeResult::Error(problem) => inv.fail(problem),
            OpcodeResult::Lazy(next) => Step::Action(RuntimeAction::evaluate(next, Depth::Shallow).then(
                move |rt, produced| {
                    let step = settle(&inv.target, &produced);
                    if matches!(step, Step::Value(_)) {
                        inv.resolved(rt);
                    }
                    step
                },
            )),
            OpcodeResult::Reduce(reducer) => {
                let action = match self.reduce(reducer, &inv.cell.ty) {
                    Ok(action) => action,
                    Err(problem) => return inv.fail(problem),
                };
                Step::Action(action.then(move |rt, produced| {
                    let step = settle(&inv.target, &produced);
                    if matches!(step, Step::Value(_)) {
                        inv.resolved(rt);
                    }
                    step
                }))
            }
        }
    }

    // =========================================================================
    // Reducers
    // =========================================================================

    fn reduce(&self, reducer: ReducerValue, result_type: &Arc<VmType>) -> Result<RuntimeAction> {
        let strategy = self.config.reduce_strategy;
        let (combiner, iterable, initial) = match reducer {
            ReducerValue::Opcode {
                opcode,
                context,
                iterable,
                initial,
            } => {
                let Some(found) = self.compiler.opcodes().get(&opcode) else {
                    return Err(Problem::new(ProblemId::UNKNOWN_OPCODE, iterable.source().cloned())
                        .with("opcode", opcode.as_str())
                        .with("reason", "reducer"));
                };
                let combiner = Combiner::Opcode {
                    opcode: Arc::clone(found),
                    context,
                    ty: Arc::clone(result_type),
                };
                (combiner, iterable, initial)
            }
            ReducerValue::Function {
                function,
                first_key,
                second_key,
                context_key,
                context,
                iterable,
                initial,
            } => {
                let Some(signature) = function.ty().as_callable() else {
                    return Err(Problem::new(ProblemId::WRONG_VALUE_TYPE, function.source().cloned())
                        .with("expected", "callable")
                        .with("actual", function.ty().category().as_str()));
                };
                let argument_type = self
                    .types()
                    .resolve(&signature.argument_type)
                    .map_err(|p| p.or_location(function.source()))?;
                let combiner = Combiner::Function {
                    function,
                    first_key,
                    second_key,
                    context: context_key.zip(context),
                    argument_type,
                };
                (combiner, iterable, initial)
            }
        };
        let combiner = Rc::new(combiner);
        Ok(RuntimeAction::evaluate(iterable, Depth::Shallow).then(move |rt, iterable| {
            let Some(items) = iterable.value().and_then(EvaluatedValue::as_iterable) else {
                return Step::Error(
                    Problem::new(ProblemId::WRONG_VALUE_TYPE, iterable.source().cloned())
                        .with("expected", "iterable")
                        .with("actual", iterable.ty().category().as_str()),
                );
            };
            let terms: VecDeque<MemoryValue> = std::iter::once(initial).chain(items.to_vec()).collect();
            trace!(terms = terms.len(), ?strategy, "reducing");
            match strategy {
                ReduceStrategy::Sequential => {
                    let mut terms = terms;
                    match terms.pop_front() {
                        Some(first) => rt.sequential(combiner, first, terms),
                        None => Step::Error(order_violation("empty fold")),
                    }
                }
                ReduceStrategy::Pairwise => rt.pairwise(combiner, terms.into_iter().collect()),
            }
        }))
    }

    fn sequential(&self, combiner: Rc<Combiner>, acc: MemoryValue, mut rest: VecDeque<MemoryValue>) -> Step {
        let Some(next) = rest.pop_front() else {
            return self.force(acc, Depth::Shallow);
        };
        match self.combine(&combiner, acc, next) {
            Ok(action) => Step::Action(action.then(move |rt, acc| rt.sequential(combiner, acc, rest))),
            Err(problem) => Step::Error(problem),
        }
    }

    fn pairwise(&self, combiner: Rc<Combiner>, mut level: Vec<MemoryValue>) -> Step {
        if level.len() <= 1 {
            return match level.pop() {
                Some(only) => self.force(only, Depth::Shallow),
                None => Step::Error(order_violation("empty fold")),
            };
        }
        let carry = if level.len() % 2 == 1 { level.pop() } else { None };
        let mut pairs = Vec::with_capacity(level.len() / 2);
        let mut terms = level.into_iter();
        while let (Some(left), Some(right)) = (terms.next(), terms.next()) {
            match self.combine(&combiner, left, right) {
                Ok(action) => pairs.push(action),
                Err(problem) => return Step::Error(problem),
            }
        }
        Step::Action(RuntimeAction::new(pairs, move |rt, mut next| {
            next.extend(carry);
            rt.pairwise(combiner, next)
        }))
    }

    fn combine(&self, combiner: &Combiner, left: MemoryValue, right: MemoryValue) -> Result<RuntimeAction> {
        match combiner {
            Combiner::Opcode { opcode, context, ty } => {
                let cell = Arc::new(
                    MemoryCell::external("reduce", Arc::clone(ty))
                        .with_source(SourcePosition::internal("reduce")),
                );
                let target = self.memory.allocate(Arc::clone(&cell), None);
                let mut args = vec![left, right];
                args.extend(context.iter().cloned());
                Ok(opcode_action(Invocation {
                    opcode: Arc::clone(opcode),
                    args,
                    bound: BoundTypes::new(),
                    cell,
                    function: None,
                    index: target.index().unwrap_or_default(),
                    target,
                }))
            }
            Combiner::Function {
                function,
                first_key,
                second_key,
                context,
                argument_type,
            } => {
                let mut entries = vec![(first_key.clone(), left), (second_key.clone(), right)];
                entries.extend(context.iter().cloned());
                let factory = MemoryFactory::new(self.memory);
                let value = factory.structure().from_memory(entries, argument_type)?;
                let cell = Arc::new(
                    MemoryCell::external("reduce", Arc::clone(argument_type))
                        .with_source(SourcePosition::internal("reduce")),
                );
                let argument = self.memory.allocate(cell, Some(value));
                let call = factory.call().create_call(function, &argument)?;
                Ok(RuntimeAction::evaluate(call, Depth::Shallow))
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

enum Combiner {
    Opcode {
        opcode: Arc<dyn Opcode>,
        context: Option<MemoryValue>,
        ty: Arc<VmType>,
    },
    Function {
        function: MemoryValue,
        first_key: String,
        second_key: String,
        context: Option<(String, MemoryValue)>,
        argument_type: Arc<VmType>,
    },
}

struct Invocation {
    opcode: Arc<dyn Opcode>,
    args: Vec<MemoryValue>,
    bound: BoundTypes,
    cell: Arc<MemoryCell>,
    function: Option<Arc<CallableValue>>,
    index: MemoryIndex,
    target: MemoryValue,
}

impl Invocation {
    fn fail(&self, problem: Problem) -> Step {
        Step::Error(
            problem
                .augment("opcode", self.opcode.mnemonic())
                .or_location(self.cell.best_source()),
        )
    }

    fn resolved(&self, rt: &Runtime<'_>) {
        rt.debugger
            .opcode_evaluation_resolved(self.function.as_deref(), self.index, &self.cell, &self.target);
    }
}

/// Evaluates an opcode's arguments as its signature asks, then invokes it.
fn opcode_action(inv: Invocation) -> RuntimeAction {
    let dependencies = inv
        .opcode
        .signature()
        .arguments
        .iter()
        .zip(&inv.args)
        .filter_map(|(decl, arg)| match decl.evaluation {
            EvaluationKind::Evaluated => Some(RuntimeAction::evaluate(arg.clone(), Depth::Deep)),
            EvaluationKind::ShallowEvaluation => Some(RuntimeAction::evaluate(arg.clone(), Depth::Shallow)),
            EvaluationKind::Lazy => None,
        })
        .collect();
    RuntimeAction::new(dependencies, move |rt, _| rt.invoke(inv))
}

struct Frame {
    pending: Vec<RuntimeAction>,
    expected: usize,
    results: Vec<MemoryValue>,
    errors: Vec<Problem>,
    compute: Compute,
}

impl Frame {
    fn new(action: RuntimeAction) -> Self {
        let mut pending = action.dependencies;
        let expected = pending.len();
        pending.reverse();
        Self {
            pending,
            expected,
            results: Vec::with_capacity(expected),
            errors: Vec::new(),
            compute: action.compute,
        }
    }

    fn finish(self, rt: &Runtime<'_>) -> Step {
        if let Some(problem) = first_error_wins(self.errors) {
            return Step::Error(problem);
        }
        if self.results.len() != self.expected {
            return Step::Error(
                order_violation("dependency results out of step")
                    .with("expected", self.expected)
                    .with("actual", self.results.len()),
            );
        }
        (self.compute)(rt, self.results)
    }
}

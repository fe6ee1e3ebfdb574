//! Call compilation.
//!
//! A callable's cells are checked once and turned into a [`CompiledCall`]:
//! the cells reachable from the return cell, each with its opcode resolved,
//! its generics bound, and its constant references looked up. Compilation
//! reports every problem it finds. Results, including failures, are cached
//! per constant-memory index for the compiler's lifetime.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use cellvm_foundation::{
    IterableType, KeyOfType, NativeValue, Problem, ProblemId, RUNTIME_TYPE, Result, SourcePosition,
    TypeRef, TypeRegistry, ValidationCollector, VmType,
};
use cellvm_memory::{
    CALLABLE_ARGUMENT_MEMORY_INDEX, CALLABLE_RETURN_MEMORY_INDEX, CallableValue, CellKind,
    ConstantMemory, EvaluatedValue, MemoryCell, MemoryIndex, MemoryValue, ScriptContext,
};
use tracing::{debug, trace};

use crate::engine::{Activation, Depth, Runtime, RuntimeAction};
use crate::opcode::{BoundTypes, Opcode, OpcodeFrame, OpcodeSignature, OpcodeTable};

/// A compiled call, or every problem found while compiling it.
pub type CompileResult = std::result::Result<Arc<CompiledCall>, Vec<Problem>>;

// =============================================================================
// Compiled calls
// =============================================================================

/// How one compiled cell produces its value.
#[derive(Clone, Debug)]
pub(crate) enum NodeOp {
    /// The call's argument.
    Argument,
    /// An evaluated module constant.
    Constant(MemoryValue),
    /// A structure over other cells.
    Structured(BTreeMap<String, MemoryIndex>),
    /// An iterable over other cells.
    Iterable(Vec<MemoryIndex>),
    /// An opcode invocation.
    Opcode {
        opcode: Arc<dyn Opcode>,
        arguments: Vec<MemoryIndex>,
        bound: BoundTypes,
    },
    /// A call of another callable cell.
    Calling {
        callable: MemoryIndex,
        argument: MemoryIndex,
    },
}

#[derive(Clone, Debug)]
pub(crate) struct CompiledNode {
    pub(crate) cell: Arc<MemoryCell>,
    pub(crate) op: NodeOp,
}

/// A checked callable, ready to be instantiated per call.
#[derive(Debug)]
pub struct CompiledCall {
    index: Option<MemoryIndex>,
    callable: Arc<CallableValue>,
    argument_type: Arc<VmType>,
    return_type: Arc<VmType>,
    pub(crate) nodes: BTreeMap<MemoryIndex, CompiledNode>,
}

impl CompiledCall {
    /// Memory index of the compiled callable value, if it had one.
    #[must_use]
    pub const fn index(&self) -> Option<MemoryIndex> {
        self.index
    }

    /// The callable.
    #[must_use]
    pub const fn callable(&self) -> &Arc<CallableValue> {
        &self.callable
    }

    /// Resolved argument type.
    #[must_use]
    pub const fn argument_type(&self) -> &Arc<VmType> {
        &self.argument_type
    }

    /// Resolved return type.
    #[must_use]
    pub const fn return_type(&self) -> &Arc<VmType> {
        &self.return_type
    }

    /// Number of cells reachable from the return cell.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Instantiates the call for one argument.
    ///
    /// Each computed cell gets a fresh slot in the runtime's local memory;
    /// the argument and constant cells reuse the given values. The returned
    /// action evaluates the return cell.
    ///
    /// # Errors
    ///
    /// `TYPE_MISMATCH` if the argument does not fit the argument type.
    pub fn construct_call(self: &Arc<Self>, rt: &Runtime<'_>, argument: MemoryValue) -> Result<RuntimeAction> {
        if !argument.ty().is_runtime_determined() {
            rt.types()
                .enforce_type_match(argument.source(), argument.ty(), Some(&*self.argument_type))
                .map_err(|p| p.augment("position", "argument"))?;
        }
        let mut slots = BTreeMap::new();
        for (&index, node) in &self.nodes {
            let slot = match &node.op {
                NodeOp::Argument => argument.clone(),
                NodeOp::Constant(value) => value.clone(),
                _ => rt.memory().allocate(Arc::clone(&node.cell), None),
            };
            slots.insert(index, slot);
        }
        let Some(ret) = slots.get(&CALLABLE_RETURN_MEMORY_INDEX).cloned() else {
            return Err(Problem::new(ProblemId::STRUCTURE_CORRUPT, self.callable.source.clone())
                .with("reason", "compiled call has no return cell"));
        };
        rt.register(Activation::new(Arc::clone(self), slots));
        trace!(nodes = self.nodes.len(), "call constructed");
        Ok(RuntimeAction::evaluate(ret, Depth::Shallow))
    }
}

// =============================================================================
// Compiler
// =============================================================================

/// Compiles callables and caches the results.
pub struct CallCompiler {
    context: Arc<ScriptContext>,
    opcodes: Arc<OpcodeTable>,
    cache: RwLock<HashMap<MemoryIndex, CompileResult>>,
}

impl fmt::Debug for CallCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCompiler")
            .field("opcodes", &self.opcodes.keys().collect::<Vec<_>>())
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}

impl CallCompiler {
    /// Creates a compiler for a loaded script.
    #[must_use]
    pub fn new(context: Arc<ScriptContext>, opcodes: Arc<OpcodeTable>) -> Self {
        Self {
            context,
            opcodes,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The loaded script.
    #[must_use]
    pub const fn context(&self) -> &Arc<ScriptContext> {
        &self.context
    }

    /// Opcodes by mnemonic.
    #[must_use]
    pub fn opcodes(&self) -> &OpcodeTable {
        &self.opcodes
    }

    /// Number of cached results.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Compiles the callable stored at `index` in constant memory.
    ///
    /// # Errors
    ///
    /// Every problem found; see [`compile_value`](Self::compile_value).
    /// `NO_SUCH_CONSTANT` if nothing is stored at `index`.
    pub fn compile(&self, memory: &ConstantMemory, index: MemoryIndex) -> CompileResult {
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&index)
        {
            trace!(index, "compile cache hit");
            return hit.clone();
        }
        let result = match memory.get(index) {
            Some(value) => self.compile_value(memory, value),
            None => Err(vec![
                Problem::new(ProblemId::NO_SUCH_CONSTANT, None).with("index", index),
            ]),
        };
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(index)
            .or_insert(result)
            .clone()
    }

    /// Compiles a callable value without caching.
    ///
    /// # Errors
    ///
    /// `NOT_CALLABLE` for a non-callable value, `INVALID_RETURN_CELL` /
    /// `INVALID_ARGUMENT_CELL` for misplaced external cells,
    /// `STRUCTURE_CORRUPT` for cycles and dangling references,
    /// `NO_SUCH_CONSTANT`, `UNKNOWN_OPCODE`, `ARGUMENT_COUNT`,
    /// `ARGUMENT_REF`, `ARGUMENT_TYPE`, `BIND_HINT_MISMATCH`,
    /// `TYPE_MISMATCH`, and whatever opcode static validation reports.
    pub fn compile_value(&self, memory: &ConstantMemory, value: &MemoryValue) -> CompileResult {
        let not_callable = || {
            vec![Problem::new(ProblemId::NOT_CALLABLE, value.source().cloned())
                .with("type", value.ty().name())]
        };
        let Some(signature) = value.ty().as_callable() else {
            return Err(not_callable());
        };
        let Some(callable) = value.value().and_then(EvaluatedValue::as_callable) else {
            return Err(not_callable());
        };
        let types = &self.context.types;
        let source = callable.source.clone().or_else(|| value.source().cloned());
        let mut problems = ValidationCollector::new();
        let argument_type =
            problems.check(types.resolve(&signature.argument_type).map_err(|p| p.or_location(source.as_ref())));
        let return_type =
            problems.check(types.resolve(&signature.return_type).map_err(|p| p.or_location(source.as_ref())));
        let (Some(argument_type), Some(return_type)) = (argument_type, return_type) else {
            return Err(problems.into_problems());
        };

        let mut builder = Builder {
            compiler: self,
            types,
            memory,
            callable,
            problems: Vec::new(),
        };
        let nodes = builder.build(&argument_type, &return_type);
        if !builder.problems.is_empty() {
            debug!(problems = builder.problems.len(), "call failed to compile");
            return Err(builder.problems);
        }
        debug!(index = ?value.index(), nodes = nodes.len(), "call compiled");
        Ok(Arc::new(CompiledCall {
            index: value.index(),
            callable: Arc::clone(callable),
            argument_type,
            return_type,
            nodes,
        }))
    }
}

// =============================================================================
// Per-callable compilation
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

struct Builder<'a> {
    compiler: &'a CallCompiler,
    types: &'a TypeRegistry,
    memory: &'a ConstantMemory,
    callable: &'a CallableValue,
    problems: Vec<Problem>,
}

impl Builder<'_> {
    fn build(&mut self, argument_type: &Arc<VmType>, return_type: &Arc<VmType>) -> BTreeMap<MemoryIndex, CompiledNode> {
        let mut nodes = BTreeMap::new();
        let Some(ret) = self.callable.return_cell() else {
            self.problems.push(
                Problem::new(ProblemId::INVALID_RETURN_CELL, self.callable.source.clone())
                    .with("reason", "missing"),
            );
            return nodes;
        };
        if matches!(ret.kind, CellKind::External { .. }) {
            self.problems.push(
                Problem::new(ProblemId::INVALID_RETURN_CELL, ret.best_source().cloned())
                    .with("kind", ret.kind.as_str()),
            );
            return nodes;
        }
        self.check_type(ret.best_source(), &ret.ty, return_type, "return");

        match self.callable.argument_cell() {
            Some(arg) if matches!(arg.kind, CellKind::External { .. }) => {
                self.check_type(arg.best_source(), argument_type, &arg.ty, "argument");
            }
            Some(arg) => self.problems.push(
                Problem::new(ProblemId::INVALID_ARGUMENT_CELL, arg.best_source().cloned())
                    .with("cell", CALLABLE_ARGUMENT_MEMORY_INDEX)
                    .with("kind", arg.kind.as_str()),
            ),
            None => self.problems.push(
                Problem::new(ProblemId::INVALID_ARGUMENT_CELL, self.callable.source.clone())
                    .with("cell", CALLABLE_ARGUMENT_MEMORY_INDEX)
                    .with("reason", "missing"),
            ),
        }

        for index in self.reachable() {
            let Some(cell) = self.callable.cell(index) else {
                continue;
            };
            if let Some(op) = self.compile_node(index, cell, &nodes) {
                nodes.insert(
                    index,
                    CompiledNode {
                        cell: Arc::new(cell.clone()),
                        op,
                    },
                );
            }
        }
        nodes
    }

    /// Cells reachable from the return cell, dependencies first. Reports
    /// cycles and dangling references.
    fn reachable(&mut self) -> Vec<MemoryIndex> {
        let mut marks: HashMap<MemoryIndex, Mark> = HashMap::new();
        let mut order = Vec::new();
        let mut stack = vec![(CALLABLE_RETURN_MEMORY_INDEX, false)];
        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                marks.insert(index, Mark::Done);
                order.push(index);
                continue;
            }
            if marks.contains_key(&index) {
                continue;
            }
            let Some(cell) = self.callable.cell(index) else {
                continue;
            };
            marks.insert(index, Mark::Open);
            stack.push((index, true));
            for (position, reference) in cell.kind.references().into_iter().enumerate().rev() {
                match marks.get(&reference) {
                    Some(Mark::Open) => self.problems.push(
                        Problem::new(ProblemId::STRUCTURE_CORRUPT, cell.best_source().cloned())
                            .with("reason", "cycle")
                            .with("cell", index)
                            .with("reference", reference),
                    ),
                    Some(Mark::Done) => {}
                    None if self.callable.cell(reference).is_none() => {
                        self.problems.push(dangling(cell, index, position, reference));
                    }
                    None => stack.push((reference, false)),
                }
            }
        }
        order
    }

    fn compile_node(
        &mut self,
        index: MemoryIndex,
        cell: &MemoryCell,
        nodes: &BTreeMap<MemoryIndex, CompiledNode>,
    ) -> Option<NodeOp> {
        let source = cell.best_source();
        match &cell.kind {
            CellKind::External { name } => {
                if index == CALLABLE_ARGUMENT_MEMORY_INDEX {
                    Some(NodeOp::Argument)
                } else {
                    self.problems.push(
                        Problem::new(ProblemId::INVALID_ARGUMENT_CELL, source.cloned())
                            .with("cell", index)
                            .with("name", name.as_str()),
                    );
                    None
                }
            }
            CellKind::Constant { module, constant } => {
                let Some(value) = self.memory.lookup(module, constant).and_then(|at| self.memory.get(at)) else {
                    self.problems.push(
                        Problem::new(ProblemId::NO_SUCH_CONSTANT, source.cloned())
                            .with("module", module.as_str())
                            .with("constant", constant.as_str()),
                    );
                    return None;
                };
                self.check_type(source, value.ty(), &cell.ty, constant);
                Some(NodeOp::Constant(value.clone()))
            }
            CellKind::Structured { values } => {
                self.check_structure(cell, values);
                Some(NodeOp::Structured(values.clone()))
            }
            CellKind::Iterable { values } => {
                self.check_iterable(cell, values);
                Some(NodeOp::Iterable(values.clone()))
            }
            CellKind::Opcode {
                opcode,
                arguments,
                bound_types,
            } => self.compile_opcode(index, cell, opcode, arguments, bound_types, nodes),
            CellKind::Calling { callable, argument } => {
                self.check_calling(cell, *callable, *argument);
                Some(NodeOp::Calling {
                    callable: *callable,
                    argument: *argument,
                })
            }
        }
    }

    fn check_type(&mut self, source: Option<&SourcePosition>, actual: &VmType, expected: &VmType, at: &str) -> bool {
        if actual.is_runtime_determined() || expected.is_runtime_determined() {
            return true;
        }
        match self.types.enforce_type_match(source, actual, Some(expected)) {
            Ok(()) => true,
            Err(p) => {
                self.problems.push(p.augment("at", at));
                false
            }
        }
    }

    fn check_member(&mut self, source: Option<&SourcePosition>, child: MemoryIndex, expected: &TypeRef, at: &str) {
        if expected.as_generic().is_some() {
            return;
        }
        let Some(cell) = self.callable.cell(child) else {
            return;
        };
        match self.types.resolve(expected) {
            Ok(expected) => {
                let actual = Arc::clone(&cell.ty);
                self.check_type(source, &actual, &expected, at);
            }
            Err(p) => self.problems.push(p.or_location(source).augment("at", at)),
        }
    }

    fn wrong_kind(&mut self, cell: &MemoryCell, expected: &str) {
        self.problems.push(
            Problem::new(ProblemId::WRONG_VALUE_TYPE, cell.best_source().cloned())
                .with("expected", expected)
                .with("actual", cell.ty.category().as_str())
                .with("type", cell.ty.name()),
        );
    }

    fn check_structure(&mut self, cell: &MemoryCell, values: &BTreeMap<String, MemoryIndex>) {
        if cell.ty.is_runtime_determined() {
            return;
        }
        let Some(structured) = cell.ty.as_structured() else {
            self.wrong_kind(cell, "structured");
            return;
        };
        let source = cell.best_source();
        for (key, expected) in &structured.stores {
            match values.get(key) {
                Some(&child) => self.check_member(source, child, expected, key),
                None => self.problems.push(
                    Problem::new(ProblemId::TYPE_MISMATCH, source.cloned())
                        .with("type", cell.ty.name())
                        .with("missing_key", key.as_str()),
                ),
            }
        }
        for key in values.keys() {
            if !structured.stores.contains_key(key) {
                self.problems.push(
                    Problem::new(ProblemId::TYPE_MISMATCH, source.cloned())
                        .with("type", cell.ty.name())
                        .with("unexpected_key", key.as_str()),
                );
            }
        }
    }

    fn check_iterable(&mut self, cell: &MemoryCell, values: &[MemoryIndex]) {
        if cell.ty.is_runtime_determined() {
            return;
        }
        let Some(iterable) = cell.ty.as_iterable() else {
            self.wrong_kind(cell, "iterable");
            return;
        };
        for (position, &child) in values.iter().enumerate() {
            self.check_member(cell.best_source(), child, &iterable.value_type, &position.to_string());
        }
    }

    fn check_calling(&mut self, cell: &MemoryCell, callable: MemoryIndex, argument: MemoryIndex) {
        let Some(function) = self.callable.cell(callable) else {
            return;
        };
        if function.ty.is_runtime_determined() {
            return;
        }
        let Some(signature) = function.ty.as_callable() else {
            self.wrong_kind(function, "callable");
            return;
        };
        let source = cell.best_source();
        self.check_member(source, argument, &signature.argument_type, "argument");
        if signature.return_type.as_generic().is_none() {
            match self.types.resolve(&signature.return_type) {
                Ok(ret) => {
                    self.check_type(source, &ret, &cell.ty, "return");
                }
                Err(p) => self.problems.push(p.or_location(source)),
            }
        }
    }

    fn compile_opcode(
        &mut self,
        index: MemoryIndex,
        cell: &MemoryCell,
        mnemonic: &str,
        arguments: &[MemoryIndex],
        explicit: &BoundTypes,
        nodes: &BTreeMap<MemoryIndex, CompiledNode>,
    ) -> Option<NodeOp> {
        let source = cell.best_source().cloned();
        let here = |id| {
            Problem::new(id, source.clone())
                .with("opcode", mnemonic)
                .with("cell", index)
        };
        let Some(opcode) = self.compiler.opcodes.get(mnemonic) else {
            self.problems.push(here(ProblemId::UNKNOWN_OPCODE));
            return None;
        };
        let sig = opcode.signature();
        if arguments.len() != sig.arguments.len() {
            self.problems.push(
                here(ProblemId::ARGUMENT_COUNT)
                    .with("expected", sig.arguments.len())
                    .with("actual", arguments.len()),
            );
            return None;
        }
        let arg_cells: Vec<&MemoryCell> = arguments.iter().filter_map(|&i| self.callable.cell(i)).collect();
        if arg_cells.len() != arguments.len() {
            return None;
        }
        let constants: Vec<Option<&MemoryValue>> = arguments
            .iter()
            .map(|i| match nodes.get(i).map(|n| &n.op) {
                Some(NodeOp::Constant(value)) => Some(value),
                _ => None,
            })
            .collect();

        let mut ok = true;
        let mut bound = BoundTypes::new();
        for g in &sig.generics {
            let ty = if let Some(t) = explicit.get(&g.id) {
                Arc::clone(t)
            } else if let Some(i) = g.from_argument_index {
                constants
                    .get(i)
                    .copied()
                    .flatten()
                    .and_then(MemoryValue::value)
                    .and_then(EvaluatedValue::as_native)
                    .and_then(NativeValue::as_type)
                    .cloned()
                    .unwrap_or_else(|| Arc::clone(&RUNTIME_TYPE))
            } else if let Some(i) = g.keyed_type_argument_index {
                keyed_binding(self.types, arg_cells.get(i).copied(), constants.get(i).copied().flatten(), &bound)
            } else {
                infer_binding(self.types, &g.id, sig, &arg_cells)
                    .or_else(|| bind_from(self.types, &g.id, &sig.return_type, &cell.ty))
                    .unwrap_or_else(|| Arc::clone(&RUNTIME_TYPE))
            };
            if !ty.is_runtime_determined() && !g.hint.accepts(ty.category()) {
                self.problems.push(
                    here(ProblemId::BIND_HINT_MISMATCH)
                        .with("genericId", g.id.as_str())
                        .with("hint", g.hint.as_str())
                        .with("type", ty.name()),
                );
                ok = false;
            }
            bound.insert(g.id.clone(), ty);
        }
        if !ok {
            return None;
        }

        for (position, (decl, actual)) in sig.arguments.iter().zip(&arg_cells).enumerate() {
            let expected = match substitute(self.types, &decl.ty, &bound) {
                Ok(t) => t,
                Err(p) => {
                    self.problems.push(p.or_location(source.as_ref()).augment("opcode", mnemonic));
                    ok = false;
                    continue;
                }
            };
            if expected.is_runtime_determined() || actual.ty.is_runtime_determined() {
                continue;
            }
            if let Err(p) = self.types.enforce_type_match(source.as_ref(), &actual.ty, Some(&*expected)) {
                self.problems.push(
                    here(ProblemId::ARGUMENT_TYPE)
                        .with("argIndex", position)
                        .with("argName", decl.display_name())
                        .augment_all(&p.parameters),
                );
                ok = false;
            }
        }

        match substitute(self.types, &sig.return_type, &bound) {
            Ok(ret) => {
                if !ret.is_runtime_determined() && !cell.ty.is_runtime_determined() {
                    if let Err(p) = self.types.enforce_type_match(source.as_ref(), &ret, Some(&*cell.ty)) {
                        self.problems.push(p.augment("opcode", mnemonic).augment("position", "return"));
                        ok = false;
                    }
                }
            }
            Err(p) => {
                self.problems.push(p.or_location(source.as_ref()).augment("opcode", mnemonic));
                ok = false;
            }
        }
        if !ok {
            return None;
        }

        let frame = OpcodeFrame {
            source: source.clone(),
            context: &self.compiler.context,
            args: arguments
                .iter()
                .zip(&constants)
                .zip(&arg_cells)
                .map(|((_, constant), arg)| match constant {
                    Some(value) => (*value).clone(),
                    None => MemoryValue::new(None, Arc::new((*arg).clone())),
                })
                .collect(),
            return_type: Arc::clone(&cell.ty),
            bound_types: bound.clone(),
        };
        let found = opcode.static_validation(&frame);
        if !found.is_empty() {
            self.problems.extend(found.into_iter().map(|p| {
                p.or_location(source.as_ref())
                    .augment("opcode", mnemonic)
                    .augment("cell", index)
            }));
            return None;
        }
        Some(NodeOp::Opcode {
            opcode: Arc::clone(opcode),
            arguments: arguments.to_vec(),
            bound,
        })
    }
}

fn dangling(cell: &MemoryCell, index: MemoryIndex, position: usize, reference: MemoryIndex) -> Problem {
    match &cell.kind {
        CellKind::Opcode { opcode, .. } => Problem::new(ProblemId::ARGUMENT_REF, cell.best_source().cloned())
            .with("opcode", opcode.as_str())
            .with("cell", index)
            .with("argIndex", position)
            .with("reference", reference),
        _ => Problem::new(ProblemId::STRUCTURE_CORRUPT, cell.best_source().cloned())
            .with("reason", "missing cell")
            .with("cell", index)
            .with("reference", reference),
    }
}

// =============================================================================
// Generic binding
// =============================================================================

/// Binds a generic from the structure member named by a constant key.
fn keyed_binding(
    types: &TypeRegistry,
    arg: Option<&MemoryCell>,
    constant: Option<&MemoryValue>,
    bound: &BoundTypes,
) -> Arc<VmType> {
    let key = constant
        .and_then(MemoryValue::value)
        .and_then(|v| v.as_key().or_else(|| v.as_str()));
    let structure = arg.and_then(|a| a.ty.as_key_of()).and_then(|k| match &k.structure_source {
        TypeRef::Generic(g) => bound.get(&g.id).cloned(),
        other => types.resolve(other).ok(),
    });
    match (key, structure) {
        (Some(key), Some(structure)) => structure
            .as_structured()
            .and_then(|s| s.stores.get(key))
            .and_then(|member| types.resolve(member).ok())
            .unwrap_or_else(|| Arc::clone(&RUNTIME_TYPE)),
        _ => Arc::clone(&RUNTIME_TYPE),
    }
}

/// Binds a generic from the first argument declared with it.
fn infer_binding(
    types: &TypeRegistry,
    id: &str,
    sig: &OpcodeSignature,
    arg_cells: &[&MemoryCell],
) -> Option<Arc<VmType>> {
    sig.arguments
        .iter()
        .zip(arg_cells)
        .find_map(|(decl, actual)| bind_from(types, id, &decl.ty, &actual.ty))
}

/// Matches a declared position against a concrete type: the generic
/// itself, an iterable of it, or a key-of it.
fn bind_from(types: &TypeRegistry, id: &str, declared: &TypeRef, actual: &Arc<VmType>) -> Option<Arc<VmType>> {
    if actual.is_runtime_determined() {
        return None;
    }
    let declared = match declared {
        TypeRef::Generic(g) => return (g.id == id).then(|| Arc::clone(actual)),
        other => types.resolve(other).ok()?,
    };
    let inner = match (&*declared, &**actual) {
        (VmType::Iterable(d), VmType::Iterable(a)) => (&d.value_type, &a.value_type),
        (VmType::KeyOf(d), VmType::KeyOf(a)) => (&d.structure_source, &a.structure_source),
        _ => return None,
    };
    match inner {
        (TypeRef::Generic(g), concrete) if g.id == id => types.resolve(concrete).ok(),
        _ => None,
    }
}

/// Replaces bound generics in a declared type. An unbound generic becomes
/// the runtime-determined type, which disables checks against it.
pub(crate) fn substitute(types: &TypeRegistry, declared: &TypeRef, bound: &BoundTypes) -> Result<Arc<VmType>> {
    let lookup = |id: &str| bound.get(id).cloned().unwrap_or_else(|| Arc::clone(&RUNTIME_TYPE));
    let ty = match declared {
        TypeRef::Generic(g) => return Ok(lookup(&g.id)),
        other => types.resolve(other)?,
    };
    match &*ty {
        VmType::Iterable(it) => {
            let TypeRef::Generic(g) = &it.value_type else {
                return Ok(ty);
            };
            let element = lookup(&g.id);
            if element.is_runtime_determined() {
                return Ok(element);
            }
            Ok(Arc::new(VmType::Iterable(IterableType {
                name: format!("{}[{}]", it.name, element.name()),
                value_type: TypeRef::Type(element),
                ..it.clone()
            })))
        }
        VmType::KeyOf(k) => {
            let TypeRef::Generic(g) = &k.structure_source else {
                return Ok(ty);
            };
            let structure = lookup(&g.id);
            if structure.is_runtime_determined() {
                return Ok(structure);
            }
            Ok(Arc::new(VmType::KeyOf(KeyOfType {
                name: format!("{}[{}]", k.name, structure.name()),
                structure_source: TypeRef::Type(structure),
                ..k.clone()
            })))
        }
        _ => Ok(ty),
    }
}

//! The interpreter handed to a host once a script is loaded.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use cellvm_foundation::{Problem, ProblemId, Result, SourcePosition, first_error_wins};
use cellvm_memory::{
    ConstantMemory, EvaluatedValue, LocalMemory, MemoryCell, ScriptContext, StoredConstantValue,
    convert_constant,
};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::compiler::CallCompiler;
use crate::config::InterpreterConfig;
use crate::debugger::{DebuggerCallbacks, NoopDebugger};
use crate::engine::{Depth, Runtime};
use crate::opcode::OpcodeTable;

static NOOP: LazyLock<Arc<dyn DebuggerCallbacks>> = LazyLock::new(|| Arc::new(NoopDebugger));

/// Runs functions of a loaded script.
///
/// An interpreter is immutable apart from its compile cache, so one
/// instance can serve concurrent calls from several threads.
pub struct Interpreter {
    context: Arc<ScriptContext>,
    memory: Arc<ConstantMemory>,
    compiler: CallCompiler,
    config: InterpreterConfig,
    debugger: OnceLock<Arc<dyn DebuggerCallbacks>>,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("modules", &self.context.modules.keys().collect::<Vec<_>>())
            .field("constants", &self.memory.len())
            .field("config", &self.config)
            .field("debugger", &self.debugger.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    pub(crate) fn new(
        context: Arc<ScriptContext>,
        memory: Arc<ConstantMemory>,
        opcodes: Arc<OpcodeTable>,
        config: InterpreterConfig,
    ) -> Self {
        Self {
            compiler: CallCompiler::new(Arc::clone(&context), opcodes),
            context,
            memory,
            config,
            debugger: OnceLock::new(),
        }
    }

    /// The loaded modules and types.
    #[must_use]
    pub const fn script_context(&self) -> &Arc<ScriptContext> {
        &self.context
    }

    /// The script's constant memory.
    #[must_use]
    pub const fn constant_memory(&self) -> &Arc<ConstantMemory> {
        &self.memory
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// The call compiler and its cache.
    #[must_use]
    pub const fn compiler(&self) -> &CallCompiler {
        &self.compiler
    }

    /// Installs debugger callbacks. Only the first call takes effect.
    ///
    /// # Errors
    ///
    /// `DEBUGGER_ALREADY_SET` on every call after the first.
    pub fn set_debugger(&self, callbacks: Arc<dyn DebuggerCallbacks>) -> Result<()> {
        self.debugger
            .set(callbacks)
            .map_err(|_| Problem::new(ProblemId::DEBUGGER_ALREADY_SET, None))
    }

    fn debugger(&self) -> &Arc<dyn DebuggerCallbacks> {
        self.debugger.get().unwrap_or(&*NOOP)
    }

    /// Compiles every callable constant, returning all problems found.
    #[must_use]
    pub fn compile_all(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        for (name, module) in &self.context.modules {
            for constant in module.constants.keys() {
                let Some(index) = self.memory.lookup(name, constant) else {
                    continue;
                };
                let is_callable = self
                    .memory
                    .get(index)
                    .is_some_and(|v| v.ty().as_callable().is_some());
                if !is_callable {
                    continue;
                }
                if let Err(found) = self.compiler.compile(&self.memory, index) {
                    problems.extend(found.into_iter().map(|p| {
                        p.augment("module", name.as_str())
                            .augment("constant", constant.as_str())
                    }));
                }
            }
        }
        debug!(problems = problems.len(), cached = self.compiler.cached(), "compiled callables");
        problems
    }

    /// Calls `module`'s function `name` with a record argument.
    ///
    /// # Errors
    ///
    /// The first runtime error; `NO_SUCH_CONSTANT` with `module` and
    /// `constant` when the function does not exist.
    pub fn run_function(
        &self,
        module: &str,
        name: &str,
        argument: BTreeMap<String, StoredConstantValue>,
    ) -> Result<EvaluatedValue> {
        self.run_function_with(module, name, argument, &CancellationToken::new())
    }

    /// Like [`run_function`](Self::run_function), stopping with `CANCELLED`
    /// once `cancel` is cancelled.
    ///
    /// # Errors
    ///
    /// As for `run_function`.
    pub fn run_function_with(
        &self,
        module: &str,
        name: &str,
        argument: BTreeMap<String, StoredConstantValue>,
        cancel: &CancellationToken,
    ) -> Result<EvaluatedValue> {
        debug!(module, function = name, "run started");
        let result = self.run(module, name, argument, cancel);
        match &result {
            Ok(value) => debug!(module, function = name, kind = value.kind_name(), "run finished"),
            Err(problem) => {
                debug!(module, function = name, problem = %problem, "run failed");
                self.debugger().generated_error(problem);
            }
        }
        result
    }

    fn run(
        &self,
        module: &str,
        name: &str,
        argument: BTreeMap<String, StoredConstantValue>,
        cancel: &CancellationToken,
    ) -> Result<EvaluatedValue> {
        let index = self.memory.lookup(module, name).ok_or_else(|| {
            Problem::new(ProblemId::NO_SUCH_CONSTANT, None)
                .with("module", module)
                .with("constant", name)
        })?;
        let in_function = |p: Problem| p.augment("module", module).augment("constant", name);
        let compiled = self
            .compiler
            .compile(&self.memory, index)
            .map_err(|found| first_error_wins(found).map_or_else(|| not_callable(module, name), in_function))?;

        let local = LocalMemory::new(Arc::clone(&self.memory), Arc::clone(&self.context.types));
        let cell = MemoryCell::external("arguments", Arc::clone(compiled.argument_type()))
            .with_source(SourcePosition::internal("arguments"));
        let record = StoredConstantValue::record(argument);
        let mut alloc = &local;
        let argument = convert_constant(&mut alloc, &self.context.types, cell, &record)
            .map_err(|found| first_error_wins(found).map_or_else(|| not_callable(module, name), in_function))?;

        let debugger = self.debugger();
        let rt = Runtime::new(&local, &self.compiler, &**debugger, &self.config, cancel);
        let action = compiled.construct_call(&rt, argument).map_err(in_function)?;
        let callable = Arc::clone(compiled.callable());
        debugger.function_started(&callable);
        let value = rt.execute(action.then(|rt, v| rt.force(v, Depth::Deep)))?;
        debugger.function_returned(&callable, &value);
        debug!(steps = rt.steps(), local = local.local_len(), "function evaluated");

        value.value().cloned().ok_or_else(|| {
            Problem::new(ProblemId::NON_EVALUATED_VALUE, value.source().cloned())
                .with("module", module)
                .with("constant", name)
        })
    }
}

fn not_callable(module: &str, name: &str) -> Problem {
    Problem::new(ProblemId::NOT_CALLABLE, None)
        .with("module", module)
        .with("constant", name)
}

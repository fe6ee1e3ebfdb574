//! Loading: validating an embedding's declarations, then scripts.
//!
//! Both stages are exhaustive. Every problem found is reported in one
//! batch, and nothing is returned unless the batch is empty.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use cellvm_foundation::{Problem, ProblemId, Problems, TypeRef, TypeRegistry, ValidationCollector, VmType};
use cellvm_memory::{ConstantMemory, Module, ScriptContext, StoredConstantValue};
use tracing::debug;

use crate::config::InterpreterConfig;
use crate::interpreter::Interpreter;
use crate::opcode::{Opcode, OpcodeTable};
use crate::validation::{is_concrete, referenced_native_types, validate_opcodes};

/// Validated opcodes and native types, ready to load scripts.
#[derive(Clone)]
pub struct ScriptLoader {
    types: Arc<TypeRegistry>,
    opcodes: Arc<OpcodeTable>,
    config: InterpreterConfig,
}

impl fmt::Debug for ScriptLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptLoader")
            .field("types", &self.types.len())
            .field("opcodes", &self.opcodes.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// Validates an embedding's opcodes and native types.
///
/// # Errors
///
/// Every problem found: `UNKNOWN_TYPE_CATEGORY` for non-native types,
/// `DUPLICATE_TYPE`, `DUPLICATE_OPCODES`, binding and argument declaration
/// problems, and `MISSING_NATIVE_TYPE` for native types an opcode uses but
/// that were not supplied.
pub fn create_script_loader(
    opcodes: Vec<Arc<dyn Opcode>>,
    native_types: Vec<Arc<VmType>>,
) -> Result<ScriptLoader, Problems> {
    let mut problems = ValidationCollector::new();
    let mut types = TypeRegistry::new();

    for ty in &native_types {
        if ty.as_native().is_none() {
            problems.push(
                Problem::new(ProblemId::UNKNOWN_TYPE_CATEGORY, ty.source().cloned())
                    .with("type", ty.name())
                    .with("category", ty.category().as_str()),
            );
            continue;
        }
        problems.check(types.add_type(ty));
    }

    problems.extend(validate_opcodes(&opcodes, &types));

    let mut reported = BTreeSet::new();
    for opcode in &opcodes {
        for internal in referenced_native_types(opcode.as_ref()) {
            if types.has_native_internal(&internal) || !reported.insert(internal.clone()) {
                continue;
            }
            problems.push(
                Problem::new(ProblemId::MISSING_NATIVE_TYPE, Some(opcode.signature().source.clone()))
                    .with("opcode", opcode.mnemonic())
                    .with("internal_type", internal),
            );
        }
    }

    if !problems.is_err() {
        for opcode in &opcodes {
            let sig = opcode.signature();
            let declared = sig.arguments.iter().map(|a| &a.ty).chain([&sig.return_type]);
            for reference in declared {
                if let TypeRef::Type(ty) = reference {
                    if is_concrete(ty) {
                        problems.check(
                            types
                                .add_type(ty)
                                .map_err(|p| p.augment("opcode", opcode.mnemonic())),
                        );
                    }
                }
            }
        }
    }

    let table: OpcodeTable = opcodes
        .into_iter()
        .map(|op| (op.mnemonic().to_string(), op))
        .collect();
    debug!(
        opcodes = table.len(),
        types = types.len(),
        problems = problems.problems().len(),
        "script loader validated"
    );
    problems.finish(ScriptLoader {
        types: Arc::new(types),
        opcodes: Arc::new(table),
        config: InterpreterConfig::default(),
    })
}

impl ScriptLoader {
    /// Builder method to set the interpreter configuration.
    #[must_use]
    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// The registered types.
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Opcodes by mnemonic.
    #[must_use]
    pub fn opcodes(&self) -> &OpcodeTable {
        &self.opcodes
    }

    /// Loads modules into an interpreter.
    ///
    /// The loader is not changed; each script gets its own copy of the
    /// registry.
    ///
    /// # Errors
    ///
    /// Every problem found: type registration conflicts (`CONFLICTING_TYPES`
    /// when a constant's type clashes with a known type of the same name),
    /// constant memory problems, and, with eager compilation, call
    /// compilation problems tagged with their `module` and `constant`.
    pub fn parse_script(&self, modules: Vec<Module>) -> Result<Interpreter, Problems> {
        let mut types = (*self.types).clone();
        let mut problems = ValidationCollector::new();

        for module in &modules {
            for (name, constant) in &module.constants {
                let at = |p: Problem| {
                    p.or_location(constant.source.as_ref())
                        .augment("module", module.name.as_str())
                        .augment("constant", name.as_str())
                };
                if let Err(p) = types.add_type(&constant.ty) {
                    let own_name = p.param_str("type") == Some(constant.ty.name());
                    if p.id == ProblemId::DUPLICATE_TYPE && own_name {
                        problems.push(at(Problem::new(ProblemId::CONFLICTING_TYPES, None).augment_all(&p.parameters)));
                    } else {
                        problems.push(at(p));
                    }
                    continue;
                }
                if let StoredConstantValue::Callable(callable) = &constant.value {
                    for (index, cell) in callable.cells() {
                        if let Err(p) = types.add_type(&cell.ty) {
                            problems.push(at(p.augment("cell", *index)));
                        }
                    }
                }
            }
        }
        // Constant memory is checked even after registration failures; a
        // constant already reported for the same problem is not repeated.
        let memory = match ConstantMemory::compile(&types, &modules) {
            Ok(memory) if !problems.is_err() => memory,
            Ok(_) => return Err(Problems::new(problems.into_problems())),
            Err(found) => {
                let mut all = problems.into_problems();
                let fresh: Vec<Problem> = found
                    .into_iter()
                    .filter(|p| !all.iter().any(|q| same_report(p, q)))
                    .collect();
                all.extend(fresh);
                return Err(Problems::new(all));
            }
        };
        let context = ScriptContext {
            modules: modules.into_iter().map(|m| (m.name.clone(), m)).collect(),
            types: Arc::new(types),
        };
        debug!(
            modules = context.modules.len(),
            constants = memory.len(),
            types = context.types.len(),
            "script loaded"
        );
        let interpreter = Interpreter::new(
            Arc::new(context),
            Arc::new(memory),
            Arc::clone(&self.opcodes),
            self.config.clone(),
        );
        if self.config.eager_compile {
            let found = interpreter.compile_all();
            if !found.is_empty() {
                return Err(Problems::new(found));
            }
        }
        Ok(interpreter)
    }
}

fn same_report(a: &Problem, b: &Problem) -> bool {
    a.id == b.id && a.param_str("module") == b.param_str("module") && a.param_str("constant") == b.param_str("constant")
}

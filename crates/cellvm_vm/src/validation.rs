//! Declaration checks for opcodes supplied by an embedding system.
//!
//! These run once, when a script loader is created, and report every
//! problem found so an embedder can fix its opcode table in one pass.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use cellvm_foundation::{
    BindHint, META_TYPE_INTERNAL, Problem, ProblemId, TypeRef, TypeRegistry, VmType,
};

use crate::opcode::{EvaluationKind, GenericBinding, Opcode, OpcodeArgument};

/// Checks one opcode's signature.
///
/// Named type references are looked up in `types`; names not yet registered
/// are skipped here and reported when the loader registers opcode types.
#[must_use]
pub fn validate_opcode(opcode: &dyn Opcode, types: &TypeRegistry) -> Vec<Problem> {
    let sig = opcode.signature();
    let mut problems = Vec::new();
    let bindings = collect_bindings(opcode, types, &mut problems);

    for (index, arg) in sig.arguments.iter().enumerate() {
        let at = |id| argument_problem(id, opcode, index, arg);
        match &arg.ty {
            TypeRef::Generic(g) => {
                if !bindings.contains_key(g.id.as_str()) {
                    problems.push(at(ProblemId::UNBOUND_GENERIC));
                }
            }
            other => {
                let Some(ty) = inline(other, types) else {
                    continue;
                };
                if ty.is_runtime_determined() {
                    problems.push(at(ProblemId::ARGUMENT_RUNTIME_TYPE));
                }
                if arg.evaluation == EvaluationKind::ShallowEvaluation
                    && ty.as_iterable().is_none()
                    && ty.as_structured().is_none()
                {
                    problems.push(at(ProblemId::ARGUMENT_EVAL_SHALLOW_SIMPLE));
                }
                for id in check_shallow_generics(&ty, &bindings) {
                    problems.push(at(id));
                }
            }
        }
        problems.extend(deep_generics(&arg.ty).into_iter().map(|_| at(ProblemId::GENERIC_BINDING_DEEP)));
    }

    let at_return = |id| return_problem(id, opcode);
    match &sig.return_type {
        TypeRef::Generic(g) => {
            if !bindings.contains_key(g.id.as_str()) {
                problems.push(at_return(ProblemId::UNBOUND_GENERIC));
            }
        }
        other => {
            if let Some(ty) = inline(other, types) {
                for id in check_shallow_generics(&ty, &bindings) {
                    problems.push(at_return(id));
                }
            }
        }
    }
    problems.extend(
        deep_generics(&sig.return_type)
            .into_iter()
            .map(|_| at_return(ProblemId::GENERIC_BINDING_DEEP)),
    );
    problems
}

/// Checks every opcode and reports duplicated mnemonics once each.
#[must_use]
pub fn validate_opcodes(opcodes: &[Arc<dyn Opcode>], types: &TypeRegistry) -> Vec<Problem> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut problems = Vec::new();
    for opcode in opcodes {
        *counts.entry(opcode.mnemonic()).or_default() += 1;
        problems.extend(validate_opcode(opcode.as_ref(), types));
    }
    for (mnemonic, count) in counts {
        if count > 1 {
            let source = opcodes
                .iter()
                .find(|o| o.mnemonic() == mnemonic)
                .map(|o| o.signature().source.clone());
            problems.push(
                Problem::new(ProblemId::DUPLICATE_OPCODES, source)
                    .with("opcode", mnemonic)
                    .with("count", count),
            );
        }
    }
    problems
}

/// Internal tags of every inline native type an opcode mentions.
#[must_use]
pub fn referenced_native_types(opcode: &dyn Opcode) -> BTreeSet<String> {
    let sig = opcode.signature();
    let mut out = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<&TypeRef> = sig.arguments.iter().map(|a| &a.ty).collect();
    stack.push(&sig.return_type);
    while let Some(reference) = stack.pop() {
        let TypeRef::Type(ty) = reference else {
            continue;
        };
        if !seen.insert(Arc::as_ptr(ty)) {
            continue;
        }
        if let Some(native) = ty.as_native() {
            out.insert(native.internal_type.clone());
        }
        stack.extend(ty.children());
    }
    out
}

/// True if no generic appears anywhere in the inline tree of a type.
#[must_use]
pub fn is_concrete(ty: &VmType) -> bool {
    let mut seen = HashSet::new();
    let mut stack: Vec<&TypeRef> = ty.children();
    while let Some(reference) = stack.pop() {
        match reference {
            TypeRef::Generic(_) => return false,
            TypeRef::Named(_) => {}
            TypeRef::Type(inner) => {
                if seen.insert(Arc::as_ptr(inner)) {
                    stack.extend(inner.children());
                }
            }
        }
    }
    true
}

fn collect_bindings<'a>(
    opcode: &'a dyn Opcode,
    types: &TypeRegistry,
    problems: &mut Vec<Problem>,
) -> BTreeMap<&'a str, &'a GenericBinding> {
    let sig = opcode.signature();
    let mut bindings = BTreeMap::new();
    for g in &sig.generics {
        let at = |id| binding_problem(id, opcode, g);
        if bindings.insert(g.id.as_str(), g).is_some() {
            problems.push(at(ProblemId::DUPLICATE_GENERIC_BINDING));
        }
        if g.from_argument_index.is_some() && g.keyed_type_argument_index.is_some() {
            problems.push(at(ProblemId::GENERIC_BINDING_STATE));
        }
        if let Some(index) = g.from_argument_index {
            match sig.arguments.get(index).map(|a| &a.ty) {
                None => problems.push(at(ProblemId::GENERIC_BINDING_INDEX)),
                Some(TypeRef::Generic(_)) => problems.push(at(ProblemId::GENERIC_BINDING_DEEP)),
                Some(other) => {
                    let is_meta = inline(other, types)
                        .and_then(|t| t.as_native().map(|n| n.internal_type == META_TYPE_INTERNAL))
                        .unwrap_or(false);
                    if !is_meta {
                        problems.push(at(ProblemId::GENERIC_BINDING_FROM_TYPE));
                    }
                }
            }
        }
        if let Some(index) = g.keyed_type_argument_index {
            match sig.arguments.get(index).map(|a| &a.ty) {
                None => problems.push(at(ProblemId::GENERIC_BINDING_INDEX)),
                Some(TypeRef::Generic(_)) => problems.push(at(ProblemId::GENERIC_BINDING_DEEP)),
                Some(other) => {
                    if inline(other, types).and_then(|t| t.as_key_of().cloned()).is_none() {
                        problems.push(at(ProblemId::GENERIC_BINDING_KEYED_TYPE));
                    }
                }
            }
        }
    }
    bindings
}

/// Generics allowed one level down: an iterable's element or a key-of's
/// structure.
fn check_shallow_generics(ty: &VmType, bindings: &BTreeMap<&str, &GenericBinding>) -> Vec<ProblemId> {
    let mut out = Vec::new();
    if let Some(TypeRef::Generic(g)) = ty.as_iterable().map(|i| &i.value_type) {
        if !bindings.contains_key(g.id.as_str()) {
            out.push(ProblemId::UNBOUND_GENERIC);
        }
    }
    if let Some(TypeRef::Generic(g)) = ty.as_key_of().map(|k| &k.structure_source) {
        match bindings.get(g.id.as_str()) {
            None => out.push(ProblemId::UNBOUND_GENERIC),
            Some(binding) => {
                if g.hint != BindHint::Structure || binding.hint != BindHint::Structure {
                    out.push(ProblemId::ARGUMENT_REQUIRES_STRUCT_BINDING);
                }
            }
        }
    }
    out
}

/// Generic references found below the allowed positions.
fn deep_generics(reference: &TypeRef) -> Vec<String> {
    let TypeRef::Type(top) = reference else {
        return Vec::new();
    };
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<(&TypeRef, usize, bool)> = Vec::new();
    let allowed_below_top = top.as_iterable().is_some() || top.as_key_of().is_some();
    for child in top.children() {
        stack.push((child, 1, allowed_below_top));
    }
    while let Some((reference, depth, allowed)) = stack.pop() {
        match reference {
            TypeRef::Generic(g) => {
                if !(allowed && depth == 1) {
                    found.push(g.id.clone());
                }
            }
            TypeRef::Named(_) => {}
            TypeRef::Type(inner) => {
                if seen.insert(Arc::as_ptr(inner)) {
                    for child in inner.children() {
                        stack.push((child, depth + 1, false));
                    }
                }
            }
        }
    }
    found
}

fn inline(reference: &TypeRef, types: &TypeRegistry) -> Option<Arc<VmType>> {
    match reference {
        TypeRef::Type(t) => Some(Arc::clone(t)),
        TypeRef::Named(name) => types.get_type_by_name(name),
        TypeRef::Generic(_) => None,
    }
}

fn binding_problem(id: ProblemId, opcode: &dyn Opcode, binding: &GenericBinding) -> Problem {
    Problem::new(id, Some(opcode.signature().source.clone()))
        .with("opcode", opcode.mnemonic())
        .with("genericId", binding.id.as_str())
}

fn argument_problem(id: ProblemId, opcode: &dyn Opcode, index: usize, arg: &OpcodeArgument) -> Problem {
    Problem::new(id, Some(opcode.signature().source.clone()))
        .with("opcode", opcode.mnemonic())
        .with("position", "argument")
        .with("argIndex", index)
        .with("argName", arg.display_name())
}

fn return_problem(id: ProblemId, opcode: &dyn Opcode) -> Problem {
    Problem::new(id, Some(opcode.signature().source.clone()))
        .with("opcode", opcode.mnemonic())
        .with("position", "return")
}

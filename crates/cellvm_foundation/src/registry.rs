//! Name-indexed type registry and the structural type matcher.
//!
//! Matching is structural and co-inductive: a pair of types already under
//! examination is assumed to match, which lets recursive types compare in
//! finite time. Results are cached by `"actual!expected"`. Failures are
//! cached as soon as they are found; successes are committed only once the
//! outermost match has succeeded, so a provisional assumption made inside a
//! failing match never leaks into the shared cache.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::problem::{Problem, ProblemId, Result};
use crate::source::SourcePosition;
use crate::types::{META_TYPE, RUNTIME_TYPE, TypeRef, VmType};

/// Registry of named types, shared by every module of a loaded script.
#[derive(Debug)]
pub struct TypeRegistry {
    types: BTreeMap<String, Arc<VmType>>,
    match_cache: RwLock<HashMap<String, Option<Problem>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TypeRegistry {
    /// Clones the registered types. The clone starts with an empty match
    /// cache.
    fn clone(&self) -> Self {
        Self {
            types: self.types.clone(),
            match_cache: RwLock::new(HashMap::new()),
        }
    }
}

impl TypeRegistry {
    /// Creates a registry containing the required built-in types.
    #[must_use]
    pub fn new() -> Self {
        let mut types = BTreeMap::new();
        for ty in [&*META_TYPE, &*RUNTIME_TYPE] {
            types.insert(ty.name().to_string(), Arc::clone(ty));
        }
        Self {
            types,
            match_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a type and every type reachable from it.
    ///
    /// Registration is atomic. Re-adding an identical definition is a no-op.
    ///
    /// # Errors
    ///
    /// `DUPLICATE_TYPE` if a reachable type conflicts with a registered one
    /// or with another reachable type of the same name; `UNKNOWN_TYPE` if a
    /// by-name reference resolves to nothing.
    pub fn add_type(&mut self, ty: &Arc<VmType>) -> Result<()> {
        let discovered = self.collect_reachable(ty)?;
        let mut added = 0_usize;
        for (name, ty) in discovered {
            if !self.types.contains_key(&name) {
                debug!(type_name = %name, category = %ty.category(), "registered type");
                self.types.insert(name, ty);
                added += 1;
            }
        }
        if added > 0 {
            // A cached UNKNOWN_TYPE may now resolve.
            self.match_cache
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        Ok(())
    }

    fn collect_reachable(&self, root: &Arc<VmType>) -> Result<BTreeMap<String, Arc<VmType>>> {
        let mut discovered: BTreeMap<String, Arc<VmType>> = BTreeMap::new();
        let mut named: Vec<(String, String)> = Vec::new();
        let mut stack = vec![Arc::clone(root)];

        while let Some(ty) = stack.pop() {
            let name = ty.name();
            if let Some(seen) = discovered.get(name) {
                if Arc::ptr_eq(seen, &ty) || seen.same_definition(&ty) {
                    continue;
                }
                return Err(duplicate(&ty, seen));
            }
            if let Some(existing) = self.types.get(name) {
                if !existing.same_definition(&ty) {
                    return Err(duplicate(&ty, existing));
                }
            }
            for child in ty.children() {
                match child {
                    TypeRef::Type(inner) => stack.push(Arc::clone(inner)),
                    TypeRef::Named(child_name) => named.push((child_name.clone(), name.to_string())),
                    TypeRef::Generic(_) => {}
                }
            }
            discovered.insert(name.to_string(), ty);
        }

        for (child_name, referrer) in named {
            if !discovered.contains_key(&child_name) && !self.types.contains_key(&child_name) {
                return Err(Problem::new(ProblemId::UNKNOWN_TYPE, root.source().cloned())
                    .with("type", child_name)
                    .with("referenced_by", referrer));
            }
        }
        Ok(discovered)
    }

    /// Looks up a type by name.
    #[must_use]
    pub fn get_type_by_name(&self, name: &str) -> Option<Arc<VmType>> {
        self.types.get(name).cloned()
    }

    /// Returns true if a type of this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if nothing is registered. Never true for a registry
    /// built with [`TypeRegistry::new`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns true if some registered native type has this internal tag.
    #[must_use]
    pub fn has_native_internal(&self, internal_type: &str) -> bool {
        self.types
            .values()
            .filter_map(|t| t.as_native())
            .any(|n| n.internal_type == internal_type)
    }

    /// Resolves a non-generic reference to a type.
    ///
    /// # Errors
    ///
    /// `UNKNOWN_TYPE` for an unresolved name or a generic reference.
    pub fn resolve(&self, reference: &TypeRef) -> Result<Arc<VmType>> {
        match reference {
            TypeRef::Type(t) => Ok(Arc::clone(t)),
            TypeRef::Named(name) => self
                .get_type_by_name(name)
                .ok_or_else(|| Problem::new(ProblemId::UNKNOWN_TYPE, None).with("type", name.as_str())),
            TypeRef::Generic(g) => Err(Problem::new(ProblemId::UNKNOWN_TYPE, None)
                .with("type", g.id.as_str())
                .with("generic", g.hint.as_str())),
        }
    }

    /// Number of cached match results.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.match_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Checks that a value of type `actual` may be used where `expected` is
    /// required. When `expected` is `None`, the registered type named like
    /// `actual` is used.
    ///
    /// # Errors
    ///
    /// `TYPE_MISMATCH` with `expected` and `actual` naming the innermost
    /// mismatching pair, and `checked_expected` / `checked_actual` naming
    /// the outermost. `UNKNOWN_TYPE` if a reference cannot be resolved.
    pub fn enforce_type_match(
        &self,
        source: Option<&SourcePosition>,
        actual: &VmType,
        expected: Option<&VmType>,
    ) -> Result<()> {
        let looked_up;
        let expected = match expected {
            Some(e) => e,
            None => {
                looked_up = self.get_type_by_name(actual.name()).ok_or_else(|| {
                    Problem::new(ProblemId::UNKNOWN_TYPE, source.cloned())
                        .with("type", actual.name())
                })?;
                &*looked_up
            }
        };
        let mut visited = HashSet::new();
        let result = self
            .match_types(expected, actual, &mut visited)
            .map_err(|p| p.or_location(source));
        if result.is_ok() && !visited.is_empty() {
            let mut cache = self
                .match_cache
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for key in visited {
                cache.entry(key).or_insert(None);
            }
        }
        result
    }

    /// Like [`enforce_type_match`](Self::enforce_type_match), for references.
    /// Generic references match only a generic with the same id and hint.
    ///
    /// # Errors
    ///
    /// As for `enforce_type_match`.
    pub fn enforce_ref_match(
        &self,
        source: Option<&SourcePosition>,
        actual: &TypeRef,
        expected: &TypeRef,
    ) -> Result<()> {
        match (actual, expected) {
            (TypeRef::Generic(_), _) | (_, TypeRef::Generic(_)) => {
                if actual.same_target(expected) {
                    Ok(())
                } else {
                    Err(mismatch_names(&expected.to_string(), &actual.to_string()).or_location(source))
                }
            }
            _ => {
                let actual = self.resolve(actual).map_err(|p| p.or_location(source))?;
                let expected = self.resolve(expected).map_err(|p| p.or_location(source))?;
                self.enforce_type_match(source, &actual, Some(&expected))
            }
        }
    }

    fn match_refs(
        &self,
        expected: &TypeRef,
        actual: &TypeRef,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        match (expected, actual) {
            (TypeRef::Generic(_), _) | (_, TypeRef::Generic(_)) => {
                if expected.same_target(actual) {
                    Ok(())
                } else {
                    Err(mismatch_names(&expected.to_string(), &actual.to_string()))
                }
            }
            _ => {
                let expected = self.resolve(expected)?;
                let actual = self.resolve(actual)?;
                self.match_types(&expected, &actual, visited)
            }
        }
    }

    fn match_types(
        &self,
        expected: &VmType,
        actual: &VmType,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        if expected.name() == actual.name() {
            return Ok(());
        }
        if expected.category() != actual.category() {
            return Err(mismatch(expected, actual)
                .with("expected_category", expected.category().as_str())
                .with("actual_category", actual.category().as_str()));
        }

        let key = format!("{}!{}", actual.name(), expected.name());
        if visited.contains(&key) {
            return Ok(());
        }
        if let Some(cached) = self
            .match_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return cached.clone().map_or(Ok(()), Err);
        }

        visited.insert(key.clone());
        let result = self.match_contents(expected, actual, visited).map_err(|p| {
            p.with("checked_expected", expected.name())
                .with("checked_actual", actual.name())
        });
        if let Err(problem) = &result {
            self.match_cache
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, Some(problem.clone()));
        }
        result
    }

    fn match_contents(
        &self,
        expected: &VmType,
        actual: &VmType,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        match (expected, actual) {
            (VmType::Native(e), VmType::Native(a)) => {
                if e.internal_type == a.internal_type {
                    Ok(())
                } else {
                    Err(mismatch(expected, actual)
                        .with("expected_internal", e.internal_type.as_str())
                        .with("actual_internal", a.internal_type.as_str()))
                }
            }
            (VmType::Iterable(e), VmType::Iterable(a)) => {
                self.match_refs(&e.value_type, &a.value_type, visited)
            }
            (VmType::Structured(e), VmType::Structured(a)) => {
                for (key, expected_ref) in &e.stores {
                    let Some(actual_ref) = a.stores.get(key) else {
                        return Err(mismatch(expected, actual)
                            .with("missing_key", key.as_str())
                            .with("missing_key_type", expected_ref.to_string()));
                    };
                    self.match_refs(expected_ref, actual_ref, visited)
                        .map_err(|p| p.augment("key", key.as_str()))?;
                }
                Ok(())
            }
            (VmType::Callable(e), VmType::Callable(a)) => {
                self.match_refs(&e.return_type, &a.return_type, visited)?;
                self.match_refs(&e.argument_type, &a.argument_type, visited)
            }
            (VmType::KeyOf(e), VmType::KeyOf(a)) => {
                self.match_refs(&e.structure_source, &a.structure_source, visited)
            }
            _ => Err(mismatch(expected, actual)),
        }
    }
}

fn mismatch(expected: &VmType, actual: &VmType) -> Problem {
    mismatch_names(expected.name(), actual.name())
}

fn mismatch_names(expected: &str, actual: &str) -> Problem {
    Problem::new(ProblemId::TYPE_MISMATCH, None)
        .with("expected", expected)
        .with("actual", actual)
}

fn duplicate(ty: &VmType, existing: &VmType) -> Problem {
    Problem::new(ProblemId::DUPLICATE_TYPE, ty.source().cloned())
        .with("type", ty.name())
        .with("category", ty.category().as_str())
        .with("existing_category", existing.category().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BindHint, Termination};
    use crate::value::NativeValue;

    fn int() -> Arc<VmType> {
        Arc::new(VmType::native("int", "i64", |v| matches!(v, NativeValue::Int(_))))
    }

    fn string() -> Arc<VmType> {
        Arc::new(VmType::native("str", "string", |v| matches!(v, NativeValue::Str(_))))
    }

    fn point(name: &str, keys: &[&str]) -> Arc<VmType> {
        Arc::new(VmType::structured(
            name,
            keys.iter().map(|k| (*k, TypeRef::from(int()))),
        ))
    }

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.add_type(&int()).unwrap();
        reg.add_type(&string()).unwrap();
        reg
    }

    // =========================================================================
    // Registration
    // =========================================================================

    #[test]
    fn new_has_required_types() {
        let reg = TypeRegistry::new();
        assert!(reg.contains("meta-type"));
        assert!(reg.contains("runtime-determined"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn add_type_registers_reachable() {
        let mut reg = TypeRegistry::new();
        let list = Arc::new(VmType::iterable("points", point("P2", &["x", "y"])));
        reg.add_type(&list).unwrap();
        assert!(reg.contains("points"));
        assert!(reg.contains("P2"));
        assert!(reg.contains("int"));
    }

    #[test]
    fn identical_readd_is_noop() {
        let mut reg = registry();
        let before = reg.len();
        reg.add_type(&int()).unwrap();
        assert_eq!(reg.len(), before);
    }

    #[test]
    fn conflicting_definition_is_atomic() {
        let mut reg = registry();
        let other_int = Arc::new(VmType::native("int", "i32", |_| true));
        let wrapper = Arc::new(VmType::structured(
            "W",
            [("a", TypeRef::from(other_int)), ("b", TypeRef::from(string()))],
        ));
        let err = reg.add_type(&wrapper).unwrap_err();
        assert_eq!(err.id, ProblemId::DUPLICATE_TYPE);
        assert_eq!(err.param_str("type"), Some("int"));
        assert!(!reg.contains("W"));
    }

    #[test]
    fn unresolved_named_ref_fails() {
        let mut reg = TypeRegistry::new();
        let s = Arc::new(VmType::structured("S", [("x", TypeRef::named("missing"))]));
        let err = reg.add_type(&s).unwrap_err();
        assert_eq!(err.id, ProblemId::UNKNOWN_TYPE);
        assert_eq!(err.param_str("type"), Some("missing"));
        assert!(!reg.contains("S"));
    }

    #[test]
    fn self_referential_type_registers() {
        let mut reg = registry();
        let node = Arc::new(VmType::structured(
            "Node",
            [("value", TypeRef::from(int())), ("next", TypeRef::named("Node"))],
        ));
        reg.add_type(&node).unwrap();
        assert!(reg.contains("Node"));
    }

    #[test]
    fn clone_has_fresh_cache() {
        let reg = registry();
        let a = point("A", &["x", "y"]);
        let b = point("B", &["x"]);
        reg.enforce_type_match(None, &a, Some(&b)).unwrap();
        assert!(reg.cache_len() > 0);
        assert_eq!(reg.clone().cache_len(), 0);
    }

    // =========================================================================
    // Matching
    // =========================================================================

    #[test]
    fn same_name_matches() {
        let reg = registry();
        reg.enforce_type_match(None, &int(), Some(&int())).unwrap();
        reg.enforce_type_match(None, &int(), None).unwrap();
    }

    #[test]
    fn expected_lookup_by_name_fails_when_unregistered() {
        let reg = TypeRegistry::new();
        let err = reg.enforce_type_match(None, &int(), None).unwrap_err();
        assert_eq!(err.id, ProblemId::UNKNOWN_TYPE);
    }

    #[test]
    fn category_mismatch() {
        let reg = registry();
        let list = VmType::iterable("ints", int());
        let err = reg.enforce_type_match(None, &list, Some(&int())).unwrap_err();
        assert_eq!(err.id, ProblemId::TYPE_MISMATCH);
        assert_eq!(err.param_str("expected"), Some("int"));
        assert_eq!(err.param_str("actual"), Some("ints"));
        assert_eq!(reg.cache_len(), 0);
    }

    #[test]
    fn structural_width_subtyping() {
        let reg = registry();
        let wide = point("Wide", &["x", "y", "z"]);
        let narrow = point("Narrow", &["x", "y"]);
        reg.enforce_type_match(None, &wide, Some(&narrow)).unwrap();

        let err = reg.enforce_type_match(None, &narrow, Some(&wide)).unwrap_err();
        assert_eq!(err.id, ProblemId::TYPE_MISMATCH);
        assert_eq!(err.param_str("missing_key"), Some("z"));
        assert_eq!(err.param_str("missing_key_type"), Some("int"));
    }

    #[test]
    fn nested_mismatch_keeps_innermost_names() {
        let reg = registry();
        let a = VmType::structured("A", [("v", TypeRef::from(int()))]);
        let b = VmType::structured("B", [("v", TypeRef::from(string()))]);
        let err = reg.enforce_type_match(None, &a, Some(&b)).unwrap_err();
        assert_eq!(err.param_str("expected"), Some("str"));
        assert_eq!(err.param_str("actual"), Some("int"));
        assert_eq!(err.param_str("checked_expected"), Some("B"));
        assert_eq!(err.param_str("checked_actual"), Some("A"));
        assert_eq!(err.param_str("key"), Some("v"));
    }

    #[test]
    fn failure_location_comes_from_caller() {
        let reg = registry();
        let src = SourcePosition::new("main", 4, 2);
        let err = reg
            .enforce_type_match(Some(&src), &string(), Some(&int()))
            .unwrap_err();
        assert_eq!(err.location, Some(src));
    }

    #[test]
    fn recursive_types_match_coinductively() {
        let mut reg = registry();
        let a = Arc::new(VmType::structured(
            "ListA",
            [("head", TypeRef::from(int())), ("tail", TypeRef::named("ListA"))],
        ));
        let b = Arc::new(VmType::structured(
            "ListB",
            [("head", TypeRef::from(int())), ("tail", TypeRef::named("ListB"))],
        ));
        reg.add_type(&a).unwrap();
        reg.add_type(&b).unwrap();
        reg.enforce_type_match(None, &a, Some(&b)).unwrap();
        reg.enforce_type_match(None, &b, Some(&a)).unwrap();
    }

    #[test]
    fn failed_match_does_not_commit_provisional_successes() {
        let mut reg = registry();
        // Both recurse through `next`; `v` differs.
        let x = Arc::new(VmType::structured(
            "X",
            [("next", TypeRef::named("X")), ("v", TypeRef::from(int()))],
        ));
        let z = Arc::new(VmType::structured(
            "Z",
            [("next", TypeRef::named("Z")), ("v", TypeRef::from(string()))],
        ));
        reg.add_type(&x).unwrap();
        reg.add_type(&z).unwrap();
        assert!(reg.enforce_type_match(None, &x, Some(&z)).is_err());
        // Repeated queries agree.
        assert!(reg.enforce_type_match(None, &x, Some(&z)).is_err());
    }

    #[test]
    fn callable_and_iterable_match() {
        let reg = registry();
        let wide = point("Wide", &["x", "y"]);
        let narrow = point("Narrow", &["x"]);
        let f_wide = VmType::callable("fw", narrow.clone(), wide.clone());
        let f_narrow = VmType::callable("fn", narrow.clone(), narrow.clone());
        reg.enforce_type_match(None, &f_wide, Some(&f_narrow)).unwrap();

        let l_wide = VmType::iterable("lw", wide).with_termination(Termination::Finite);
        let l_narrow = VmType::iterable("ln", narrow);
        reg.enforce_type_match(None, &l_wide, Some(&l_narrow)).unwrap();
    }

    #[test]
    fn generic_refs() {
        let reg = registry();
        let t = TypeRef::generic("T", BindHint::Any);
        reg.enforce_ref_match(None, &t, &TypeRef::generic("T", BindHint::Any))
            .unwrap();
        let err = reg
            .enforce_ref_match(None, &t, &TypeRef::generic("T", BindHint::Structure))
            .unwrap_err();
        assert_eq!(err.id, ProblemId::TYPE_MISMATCH);
        assert!(reg.enforce_ref_match(None, &t, &TypeRef::from(int())).is_err());
    }

    #[test]
    fn native_internal_lookup() {
        let reg = registry();
        assert!(reg.has_native_internal("i64"));
        assert!(!reg.has_native_internal("f32"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn width_subtyping_follows_key_subsets(
                wide in proptest::collection::btree_set("[a-e]", 0..5),
                narrow in proptest::collection::btree_set("[a-e]", 0..5),
            ) {
                let reg = registry();
                let w: Vec<&str> = wide.iter().map(String::as_str).collect();
                let n: Vec<&str> = narrow.iter().map(String::as_str).collect();
                let wt = point("W", &w);
                let nt = point("N", &n);
                let ok = reg.enforce_type_match(None, &wt, Some(&nt)).is_ok();
                prop_assert_eq!(ok, narrow.is_subset(&wide));
                // Cached answer agrees.
                prop_assert_eq!(reg.enforce_type_match(None, &wt, Some(&nt)).is_ok(), ok);
            }
        }
    }
}

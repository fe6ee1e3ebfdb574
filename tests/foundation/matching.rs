//! Integration tests for the type registry and matcher

use std::sync::{Arc, LazyLock};

use cellvm_foundation::{NativeValue, ProblemId, TypeRef, TypeRegistry, VmType};
use proptest::prelude::*;

static INT: LazyLock<Arc<VmType>> =
    LazyLock::new(|| Arc::new(VmType::native("int", "integer", |v| matches!(v, NativeValue::Int(_)))));

static STR: LazyLock<Arc<VmType>> =
    LazyLock::new(|| Arc::new(VmType::native("str", "string", |v| matches!(v, NativeValue::Str(_)))));

fn int() -> Arc<VmType> {
    Arc::clone(&INT)
}

fn string() -> Arc<VmType> {
    Arc::clone(&STR)
}

fn registry() -> TypeRegistry {
    let mut reg = TypeRegistry::new();
    reg.add_type(&int()).unwrap();
    reg.add_type(&string()).unwrap();
    reg
}

fn record(name: &str, keys: &[&str]) -> Arc<VmType> {
    Arc::new(VmType::structured(
        name,
        keys.iter().map(|k| (*k, TypeRef::from(int()))).collect::<Vec<_>>(),
    ))
}

// =============================================================================
// Equality
// =============================================================================

#[test]
fn every_registered_type_matches_itself() {
    let mut reg = registry();
    let pair = record("pair", &["a", "b"]);
    let list = Arc::new(VmType::iterable("pairs", Arc::clone(&pair)));
    let f = Arc::new(VmType::callable("f", Arc::clone(&pair), int()));
    let key = Arc::new(VmType::key_of("pair-key", Arc::clone(&pair)));
    for ty in [&pair, &list, &f, &key] {
        reg.add_type(ty).unwrap();
    }

    let names: Vec<String> = reg.type_names().map(str::to_string).collect();
    for name in names {
        let ty = reg.get_type_by_name(&name).unwrap();
        reg.enforce_type_match(None, &ty, Some(&ty)).unwrap();
        reg.enforce_type_match(None, &ty, None).unwrap();
    }
}

// =============================================================================
// Width Subtyping
// =============================================================================

#[test]
fn width_subtyping_is_not_symmetric() {
    let mut reg = registry();
    let wide = record("ab", &["a", "b"]);
    let narrow = record("a", &["a"]);
    reg.add_type(&wide).unwrap();
    reg.add_type(&narrow).unwrap();

    reg.enforce_type_match(None, &wide, Some(&narrow)).unwrap();
    let err = reg.enforce_type_match(None, &narrow, Some(&wide)).unwrap_err();
    assert_eq!(err.id, ProblemId::TYPE_MISMATCH);
}

// =============================================================================
// Recursive Types
// =============================================================================

#[test]
fn corecursive_structures_match() {
    let mut reg = registry();
    let node = Arc::new(VmType::structured(
        "Node",
        [("left", TypeRef::named("Node")), ("right", TypeRef::named("Node"))],
    ));
    let tree = Arc::new(VmType::structured(
        "Tree",
        [("left", TypeRef::named("Tree")), ("right", TypeRef::named("Tree"))],
    ));
    reg.add_type(&node).unwrap();
    reg.add_type(&tree).unwrap();

    reg.enforce_type_match(None, &node, Some(&tree)).unwrap();
    reg.enforce_type_match(None, &tree, Some(&node)).unwrap();
}

#[test]
fn recursive_mismatch_is_found() {
    let mut reg = registry();
    let ints = Arc::new(VmType::structured(
        "IntList",
        [("head", TypeRef::from(int())), ("tail", TypeRef::named("IntList"))],
    ));
    let strs = Arc::new(VmType::structured(
        "StrList",
        [("head", TypeRef::from(string())), ("tail", TypeRef::named("StrList"))],
    ));
    reg.add_type(&ints).unwrap();
    reg.add_type(&strs).unwrap();

    assert!(reg.enforce_type_match(None, &ints, Some(&strs)).is_err());
    // A second attempt hits the cache and agrees.
    assert!(reg.enforce_type_match(None, &ints, Some(&strs)).is_err());
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn conflicting_registration_is_atomic() {
    let mut reg = registry();
    let before: Vec<String> = reg.type_names().map(str::to_string).collect();

    let fake_int = Arc::new(VmType::structured("int", [("x", TypeRef::from(string()))]));
    let holder = Arc::new(VmType::structured(
        "holder",
        [("fresh", TypeRef::from(record("fresh", &["v"]))), ("bad", TypeRef::from(fake_int))],
    ));
    let err = reg.add_type(&holder).unwrap_err();
    assert_eq!(err.id, ProblemId::DUPLICATE_TYPE);

    let after: Vec<String> = reg.type_names().map(str::to_string).collect();
    assert_eq!(before, after);
    assert!(!reg.contains("fresh"));
    assert!(!reg.contains("holder"));
}

proptest! {
    #[test]
    fn structures_match_their_key_subsets(keys in prop::collection::btree_set("[a-e]", 1..5)) {
        let mut reg = registry();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let full = record("full", &keys);
        let head = record("head", &keys[..1]);
        reg.add_type(&full).unwrap();
        reg.add_type(&head).unwrap();
        prop_assert!(reg.enforce_type_match(None, &full, Some(&head)).is_ok());
        prop_assert_eq!(reg.enforce_type_match(None, &head, Some(&full)).is_ok(), keys.len() == 1);
    }
}

//! Native types and generic placeholders shared by the standard opcodes.

use std::sync::{Arc, LazyLock};

use cellvm_foundation::{BindHint, NativeValue, SourcePosition, TypeRef, VmType};

/// Internal tag of the integer type.
pub const INTEGER_INTERNAL: &str = "integer";

/// Internal tag of the number type.
pub const NUMBER_INTERNAL: &str = "number";

/// Internal tag of the string type.
pub const STRING_INTERNAL: &str = "string";

static INTEGER: LazyLock<Arc<VmType>> = LazyLock::new(|| {
    Arc::new(
        VmType::native("int", INTEGER_INTERNAL, |v| matches!(v, NativeValue::Int(_)))
            .with_source(SourcePosition::core("types.integer")),
    )
});

static NUMBER: LazyLock<Arc<VmType>> = LazyLock::new(|| {
    Arc::new(
        VmType::native("number", NUMBER_INTERNAL, |v| matches!(v, NativeValue::Number(_)))
            .with_source(SourcePosition::core("types.number")),
    )
});

static STRING: LazyLock<Arc<VmType>> = LazyLock::new(|| {
    Arc::new(
        VmType::native("str", STRING_INTERNAL, |v| matches!(v, NativeValue::Str(_)))
            .with_source(SourcePosition::core("types.string")),
    )
});

static ANY_STRUCT: LazyLock<Arc<VmType>> = LazyLock::new(|| {
    Arc::new(
        VmType::structured("any-struct", Vec::<(String, TypeRef)>::new())
            .with_source(SourcePosition::core("types.any-struct")),
    )
});

/// `int`: 64-bit integers.
#[must_use]
pub fn integer_type() -> Arc<VmType> {
    Arc::clone(&INTEGER)
}

/// `number`: floating point numbers.
#[must_use]
pub fn number_type() -> Arc<VmType> {
    Arc::clone(&NUMBER)
}

/// `str`: strings.
#[must_use]
pub fn string_type() -> Arc<VmType> {
    Arc::clone(&STRING)
}

/// `any-struct`: the empty structure. Every structure satisfies it.
#[must_use]
pub fn any_struct_type() -> Arc<VmType> {
    Arc::clone(&ANY_STRUCT)
}

/// The native types the standard opcodes need.
#[must_use]
pub fn standard_types() -> Vec<Arc<VmType>> {
    vec![integer_type(), number_type(), string_type()]
}

// =============================================================================
// Generics
// =============================================================================

/// `T`: any type.
#[must_use]
pub fn generic_t() -> TypeRef {
    TypeRef::generic("T", BindHint::Any)
}

/// `S`: a structure.
#[must_use]
pub fn generic_s() -> TypeRef {
    TypeRef::generic("S", BindHint::Structure)
}

/// `K`: a key of a structure.
#[must_use]
pub fn generic_k() -> TypeRef {
    TypeRef::generic("K", BindHint::KeyOf)
}

/// `R`: any type, usually a result.
#[must_use]
pub fn generic_r() -> TypeRef {
    TypeRef::generic("R", BindHint::Any)
}

/// An iterable of `T`.
#[must_use]
pub fn iterable_of_t() -> Arc<VmType> {
    Arc::new(VmType::iterable("iterable", generic_t()).with_source(SourcePosition::core("types.iterable")))
}

/// A key of the structure bound to `S`.
#[must_use]
pub fn key_of_s() -> Arc<VmType> {
    Arc::new(VmType::key_of("keyof", generic_s()).with_source(SourcePosition::core("types.generic-struct")))
}

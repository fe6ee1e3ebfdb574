//! The VM type model.
//!
//! Every value in the VM has a [`VmType`] in one of five categories. Types
//! refer to each other through [`TypeRef`], which is either an inline type,
//! a name resolved later through the [`TypeRegistry`](crate::TypeRegistry),
//! or a generic placeholder bound by an opcode.
//!
//! Named references are how recursive types are expressed: a `Node`
//! structure whose `next` field is `TypeRef::Named("Node")` refers back to
//! itself without an ownership cycle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::source::SourcePosition;
use crate::value::NativeValue;

/// Name of the built-in type whose values are types.
pub const META_TYPE_NAME: &str = "meta-type";

/// Internal tag of the meta-type.
pub const META_TYPE_INTERNAL: &str = "meta-type";

/// Name of the placeholder type for values only known at runtime.
pub const RUNTIME_TYPE_NAME: &str = "runtime-determined";

/// Internal tag of the runtime-determined type.
pub const RUNTIME_TYPE_INTERNAL: &str = "runtime-determined";

/// The built-in meta-type.
pub static META_TYPE: LazyLock<Arc<VmType>> = LazyLock::new(|| {
    Arc::new(
        VmType::native(META_TYPE_NAME, META_TYPE_INTERNAL, |v| {
            matches!(v, NativeValue::Type(_))
        })
        .with_source(SourcePosition::core("types.meta-type")),
    )
});

/// The built-in runtime-determined placeholder type. No value is ever of
/// this type; it only marks positions resolved at runtime.
pub static RUNTIME_TYPE: LazyLock<Arc<VmType>> = LazyLock::new(|| {
    Arc::new(
        VmType::native(RUNTIME_TYPE_NAME, RUNTIME_TYPE_INTERNAL, |_| false)
            .with_source(SourcePosition::internal("required.runtime-determined")),
    )
});

// =============================================================================
// Categories and hints
// =============================================================================

/// The five type categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TypeCategory {
    /// A host scalar or object.
    Native,
    /// An ordered sequence.
    Iterable,
    /// A keyed record.
    Structured,
    /// A function.
    Callable,
    /// A key of some structure type.
    KeyOf,
}

impl TypeCategory {
    /// Lowercase name for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Iterable => "iterable",
            Self::Structured => "structured",
            Self::Callable => "callable",
            Self::KeyOf => "key-of",
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an iterable is known to terminate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Termination {
    /// Guaranteed finite.
    Finite,
    /// Not guaranteed to terminate.
    Unbounded,
    /// Termination does not matter for this type.
    #[default]
    Irrelevant,
}

/// Constrains what kind of type a generic may bind to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BindHint {
    /// Any type.
    #[default]
    Any,
    /// A structured type.
    Structure,
    /// An iterable type.
    Iterable,
    /// An iterable type that need not terminate.
    NonterminatingIterable,
    /// A key-of type.
    KeyOf,
}

impl BindHint {
    /// Returns true if a type of the given category satisfies the hint.
    #[must_use]
    pub const fn accepts(self, category: TypeCategory) -> bool {
        match self {
            Self::Any => true,
            Self::Structure => matches!(category, TypeCategory::Structured),
            Self::Iterable | Self::NonterminatingIterable => {
                matches!(category, TypeCategory::Iterable)
            }
            Self::KeyOf => matches!(category, TypeCategory::KeyOf),
        }
    }

    /// Lowercase name for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Structure => "structure",
            Self::Iterable => "iterable",
            Self::NonterminatingIterable => "nonterminating-iterable",
            Self::KeyOf => "key-of",
        }
    }
}

// =============================================================================
// Type references
// =============================================================================

/// A generic placeholder, bound per opcode invocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenericRef {
    /// Identifier, unique within one opcode signature.
    pub id: String,
    /// Constraint on what the generic may bind to.
    pub hint: BindHint,
}

impl GenericRef {
    /// Creates a generic reference.
    #[must_use]
    pub fn new(id: impl Into<String>, hint: BindHint) -> Self {
        Self {
            id: id.into(),
            hint,
        }
    }
}

/// A reference from one type to another.
#[derive(Clone, Debug)]
pub enum TypeRef {
    /// An inline type.
    Type(Arc<VmType>),
    /// A type looked up by name in the registry.
    Named(String),
    /// A generic placeholder.
    Generic(GenericRef),
}

impl TypeRef {
    /// A by-name reference.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// A generic reference.
    #[must_use]
    pub fn generic(id: impl Into<String>, hint: BindHint) -> Self {
        Self::Generic(GenericRef::new(id, hint))
    }

    /// The referenced type name, or the generic id.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Type(t) => t.name(),
            Self::Named(n) => n,
            Self::Generic(g) => &g.id,
        }
    }

    /// Returns the generic reference, if this is one.
    #[must_use]
    pub const fn as_generic(&self) -> Option<&GenericRef> {
        match self {
            Self::Generic(g) => Some(g),
            _ => None,
        }
    }

    /// Returns the inline type, if this is one.
    #[must_use]
    pub const fn as_type(&self) -> Option<&Arc<VmType>> {
        match self {
            Self::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Two references are equivalent when they name the same type or the
    /// same generic. Inline and by-name references to one name agree.
    #[must_use]
    pub fn same_target(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Generic(a), Self::Generic(b)) => a == b,
            (Self::Generic(_), _) | (_, Self::Generic(_)) => false,
            (a, b) => a.name() == b.name(),
        }
    }
}

impl From<Arc<VmType>> for TypeRef {
    fn from(value: Arc<VmType>) -> Self {
        Self::Type(value)
    }
}

impl From<VmType> for TypeRef {
    fn from(value: VmType) -> Self {
        Self::Type(Arc::new(value))
    }
}

impl From<GenericRef> for TypeRef {
    fn from(value: GenericRef) -> Self {
        Self::Generic(value)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(g) => write!(f, "<{}: {}>", g.id, g.hint.as_str()),
            other => f.write_str(other.name()),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

/// Predicate deciding whether a native value belongs to a native type.
pub type NativeTypeCheck = fn(&NativeValue) -> bool;

/// A host-level scalar or object type.
#[derive(Clone, Debug)]
pub struct NativeType {
    /// Type name.
    pub name: String,
    /// Declaration position.
    pub source: Option<SourcePosition>,
    /// Host tag; two native types with the same tag are the same host type.
    pub internal_type: String,
    /// Membership predicate.
    pub is_type: NativeTypeCheck,
}

/// An ordered sequence type.
#[derive(Clone, Debug)]
pub struct IterableType {
    /// Type name.
    pub name: String,
    /// Declaration position.
    pub source: Option<SourcePosition>,
    /// Element type.
    pub value_type: TypeRef,
    /// Termination guarantee.
    pub terminates: Termination,
}

/// A keyed record type.
#[derive(Clone, Debug)]
pub struct StructuredType {
    /// Type name.
    pub name: String,
    /// Declaration position.
    pub source: Option<SourcePosition>,
    /// Field types by key.
    pub stores: BTreeMap<String, TypeRef>,
}

/// A function type.
#[derive(Clone, Debug)]
pub struct CallableType {
    /// Type name.
    pub name: String,
    /// Declaration position.
    pub source: Option<SourcePosition>,
    /// Argument type, normally structured.
    pub argument_type: TypeRef,
    /// Return type.
    pub return_type: TypeRef,
}

/// The type of keys of some structured type.
#[derive(Clone, Debug)]
pub struct KeyOfType {
    /// Type name.
    pub name: String,
    /// Declaration position.
    pub source: Option<SourcePosition>,
    /// The structure whose keys are values of this type.
    pub structure_source: TypeRef,
}

/// A VM type.
#[derive(Clone, Debug)]
pub enum VmType {
    /// See [`NativeType`].
    Native(NativeType),
    /// See [`IterableType`].
    Iterable(IterableType),
    /// See [`StructuredType`].
    Structured(StructuredType),
    /// See [`CallableType`].
    Callable(CallableType),
    /// See [`KeyOfType`].
    KeyOf(KeyOfType),
}

impl VmType {
    /// Creates a native type.
    #[must_use]
    pub fn native(
        name: impl Into<String>,
        internal_type: impl Into<String>,
        is_type: NativeTypeCheck,
    ) -> Self {
        Self::Native(NativeType {
            name: name.into(),
            source: None,
            internal_type: internal_type.into(),
            is_type,
        })
    }

    /// Creates an iterable type with irrelevant termination.
    #[must_use]
    pub fn iterable(name: impl Into<String>, value_type: impl Into<TypeRef>) -> Self {
        Self::Iterable(IterableType {
            name: name.into(),
            source: None,
            value_type: value_type.into(),
            terminates: Termination::Irrelevant,
        })
    }

    /// Creates a structured type.
    #[must_use]
    pub fn structured<K, T>(name: impl Into<String>, stores: impl IntoIterator<Item = (K, T)>) -> Self
    where
        K: Into<String>,
        T: Into<TypeRef>,
    {
        Self::Structured(StructuredType {
            name: name.into(),
            source: None,
            stores: stores
                .into_iter()
                .map(|(k, t)| (k.into(), t.into()))
                .collect(),
        })
    }

    /// Creates a callable type.
    #[must_use]
    pub fn callable(
        name: impl Into<String>,
        argument_type: impl Into<TypeRef>,
        return_type: impl Into<TypeRef>,
    ) -> Self {
        Self::Callable(CallableType {
            name: name.into(),
            source: None,
            argument_type: argument_type.into(),
            return_type: return_type.into(),
        })
    }

    /// Creates a key-of type.
    #[must_use]
    pub fn key_of(name: impl Into<String>, structure_source: impl Into<TypeRef>) -> Self {
        Self::KeyOf(KeyOfType {
            name: name.into(),
            source: None,
            structure_source: structure_source.into(),
        })
    }

    /// Sets the declaration position.
    #[must_use]
    pub fn with_source(mut self, source: SourcePosition) -> Self {
        *self.source_mut() = Some(source);
        self
    }

    /// Sets the termination guarantee. No effect on non-iterable types.
    #[must_use]
    pub fn with_termination(mut self, terminates: Termination) -> Self {
        if let Self::Iterable(it) = &mut self {
            it.terminates = terminates;
        }
        self
    }

    /// The type's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Native(t) => &t.name,
            Self::Iterable(t) => &t.name,
            Self::Structured(t) => &t.name,
            Self::Callable(t) => &t.name,
            Self::KeyOf(t) => &t.name,
        }
    }

    /// The declaration position.
    #[must_use]
    pub const fn source(&self) -> Option<&SourcePosition> {
        match self {
            Self::Native(t) => t.source.as_ref(),
            Self::Iterable(t) => t.source.as_ref(),
            Self::Structured(t) => t.source.as_ref(),
            Self::Callable(t) => t.source.as_ref(),
            Self::KeyOf(t) => t.source.as_ref(),
        }
    }

    fn source_mut(&mut self) -> &mut Option<SourcePosition> {
        match self {
            Self::Native(t) => &mut t.source,
            Self::Iterable(t) => &mut t.source,
            Self::Structured(t) => &mut t.source,
            Self::Callable(t) => &mut t.source,
            Self::KeyOf(t) => &mut t.source,
        }
    }

    /// The type's category.
    #[must_use]
    pub const fn category(&self) -> TypeCategory {
        match self {
            Self::Native(_) => TypeCategory::Native,
            Self::Iterable(_) => TypeCategory::Iterable,
            Self::Structured(_) => TypeCategory::Structured,
            Self::Callable(_) => TypeCategory::Callable,
            Self::KeyOf(_) => TypeCategory::KeyOf,
        }
    }

    /// Returns the native type, if this is one.
    #[must_use]
    pub const fn as_native(&self) -> Option<&NativeType> {
        match self {
            Self::Native(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the iterable type, if this is one.
    #[must_use]
    pub const fn as_iterable(&self) -> Option<&IterableType> {
        match self {
            Self::Iterable(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the structured type, if this is one.
    #[must_use]
    pub const fn as_structured(&self) -> Option<&StructuredType> {
        match self {
            Self::Structured(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the callable type, if this is one.
    #[must_use]
    pub const fn as_callable(&self) -> Option<&CallableType> {
        match self {
            Self::Callable(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the key-of type, if this is one.
    #[must_use]
    pub const fn as_key_of(&self) -> Option<&KeyOfType> {
        match self {
            Self::KeyOf(t) => Some(t),
            _ => None,
        }
    }

    /// Returns true for the runtime-determined placeholder.
    #[must_use]
    pub fn is_runtime_determined(&self) -> bool {
        self.as_native()
            .is_some_and(|n| n.internal_type == RUNTIME_TYPE_INTERNAL)
    }

    /// Direct child references, in a stable order.
    #[must_use]
    pub fn children(&self) -> Vec<&TypeRef> {
        match self {
            Self::Native(_) => Vec::new(),
            Self::Iterable(t) => vec![&t.value_type],
            Self::Structured(t) => t.stores.values().collect(),
            Self::Callable(t) => vec![&t.argument_type, &t.return_type],
            Self::KeyOf(t) => vec![&t.structure_source],
        }
    }

    /// Shallow structural identity: same name, category, and attributes,
    /// with children compared by name only.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        if self.name() != other.name() {
            return false;
        }
        match (self, other) {
            (Self::Native(a), Self::Native(b)) => a.internal_type == b.internal_type,
            (Self::Iterable(a), Self::Iterable(b)) => {
                a.terminates == b.terminates && a.value_type.same_target(&b.value_type)
            }
            (Self::Structured(a), Self::Structured(b)) => {
                a.stores.len() == b.stores.len()
                    && a.stores
                        .iter()
                        .zip(b.stores.iter())
                        .all(|((ka, ta), (kb, tb))| ka == kb && ta.same_target(tb))
            }
            (Self::Callable(a), Self::Callable(b)) => {
                a.argument_type.same_target(&b.argument_type)
                    && a.return_type.same_target(&b.return_type)
            }
            (Self::KeyOf(a), Self::KeyOf(b)) => a.structure_source.same_target(&b.structure_source),
            _ => false,
        }
    }
}

impl fmt::Display for VmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.category(), self.name())
    }
}

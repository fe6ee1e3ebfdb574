//! Native (host-level) scalar values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::types::VmType;

/// A native value: a scalar, a type reference, or an opaque host object.
///
/// Which native type a value belongs to is decided by the type's
/// [`is_type`](crate::types::NativeType::is_type) predicate, not by the
/// variant alone: `int` and `number` may both accept [`NativeValue::Int`].
#[derive(Clone)]
pub enum NativeValue {
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Number(f64),
    /// Immutable string.
    Str(Arc<str>),
    /// A reference to a type, the value of the `meta-type` type.
    Type(Arc<VmType>),
    /// An opaque object owned by the host.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl NativeValue {
    /// Creates a string value.
    #[must_use]
    pub fn string(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }

    /// Returns the integer, if this is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float; integers are widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the string, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the referenced type, if this is a meta-type value.
    #[must_use]
    pub fn as_type(&self) -> Option<&Arc<VmType>> {
        match self {
            Self::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Type(_) => "type",
            Self::Opaque(_) => "opaque",
        }
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => Arc::ptr_eq(a, b) || a.name() == b.name(),
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Type(t) => write!(f, "<type {}>", t.name()),
            Self::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            other => write!(f, "{other:?}"),
        }
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        Self::Str(Arc::from(value))
    }
}

//! Modules, constants, and the loaded script context.

use std::collections::BTreeMap;
use std::sync::Arc;

use cellvm_foundation::{NativeValue, SourcePosition, TypeRegistry, VmType};

use crate::value::CallableValue;

/// A constant value as supplied by the host, before conversion to memory.
#[derive(Clone, Debug)]
pub enum StoredConstantValue {
    /// A native value.
    Native(NativeValue),
    /// A structure key.
    Key(String),
    /// A function.
    Callable(Arc<CallableValue>),
    /// An iterable's elements.
    List(Vec<StoredConstantValue>),
    /// A structure's entries.
    Record(BTreeMap<String, StoredConstantValue>),
}

impl StoredConstantValue {
    /// A key value.
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    /// A record value.
    #[must_use]
    pub fn record<K: Into<String>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Lowercase shape name for diagnostics.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Native(_) => "native",
            Self::Key(_) => "key",
            Self::Callable(_) => "callable",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }
}

impl From<i64> for StoredConstantValue {
    fn from(value: i64) -> Self {
        Self::Native(NativeValue::Int(value))
    }
}

impl From<f64> for StoredConstantValue {
    fn from(value: f64) -> Self {
        Self::Native(NativeValue::Number(value))
    }
}

impl From<&str> for StoredConstantValue {
    fn from(value: &str) -> Self {
        Self::Native(NativeValue::from(value))
    }
}

impl From<NativeValue> for StoredConstantValue {
    fn from(value: NativeValue) -> Self {
        Self::Native(value)
    }
}

impl From<CallableValue> for StoredConstantValue {
    fn from(value: CallableValue) -> Self {
        Self::Callable(Arc::new(value))
    }
}

impl From<Vec<StoredConstantValue>> for StoredConstantValue {
    fn from(value: Vec<StoredConstantValue>) -> Self {
        Self::List(value)
    }
}

/// A typed constant defined by a module.
#[derive(Clone, Debug)]
pub struct ConstantValue {
    /// Where the constant was defined.
    pub source: Option<SourcePosition>,
    /// Declared type.
    pub ty: Arc<VmType>,
    /// The value; must conform to `ty`.
    pub value: StoredConstantValue,
}

impl ConstantValue {
    /// Creates a constant.
    #[must_use]
    pub fn new(ty: Arc<VmType>, value: impl Into<StoredConstantValue>) -> Self {
        Self {
            source: None,
            ty,
            value: value.into(),
        }
    }

    /// Sets the source position.
    #[must_use]
    pub fn with_source(mut self, source: SourcePosition) -> Self {
        self.source = Some(source);
        self
    }
}

/// A named unit of constants.
#[derive(Clone, Debug)]
pub struct Module {
    /// Fully qualified name, unique within a script.
    pub name: String,
    /// Where the module was loaded from.
    pub source: Option<SourcePosition>,
    /// Constants by name, including function definitions.
    pub constants: BTreeMap<String, ConstantValue>,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            constants: BTreeMap::new(),
        }
    }

    /// Adds a constant.
    #[must_use]
    pub fn with_constant(mut self, name: impl Into<String>, constant: ConstantValue) -> Self {
        self.constants.insert(name.into(), constant);
        self
    }

    /// Sets the source position.
    #[must_use]
    pub fn with_source(mut self, source: SourcePosition) -> Self {
        self.source = Some(source);
        self
    }
}

/// The loaded modules and the types they use.
#[derive(Clone, Debug)]
pub struct ScriptContext {
    /// Modules by name.
    pub modules: BTreeMap<String, Module>,
    /// The registry shared by every module.
    pub types: Arc<TypeRegistry>,
}

impl ScriptContext {
    /// Looks up a module constant.
    #[must_use]
    pub fn constant(&self, module: &str, constant: &str) -> Option<&ConstantValue> {
        self.modules.get(module)?.constants.get(constant)
    }
}

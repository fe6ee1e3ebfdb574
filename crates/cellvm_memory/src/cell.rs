//! Memory cells: immutable descriptions of how a value is produced.

use std::collections::BTreeMap;
use std::sync::Arc;

use cellvm_foundation::{SourcePosition, VmType};

/// Index of a memory cell.
///
/// Cells inside a [`CallableValue`](crate::CallableValue) are indexed in the
/// callable's own space. Cells allocated in constant or local memory are
/// indexed in the memory's space.
pub type MemoryIndex = usize;

/// Index of a callable's return cell.
pub const CALLABLE_RETURN_MEMORY_INDEX: MemoryIndex = 0;

/// Index of a callable's argument cell.
pub const CALLABLE_ARGUMENT_MEMORY_INDEX: MemoryIndex = 1;

/// How a cell's value is produced.
#[derive(Clone, Debug)]
pub enum CellKind {
    /// A named slot filled in by the host or the VM.
    External {
        /// Externally defined name.
        name: String,
    },
    /// A reference to a module constant.
    Constant {
        /// Module holding the constant.
        module: String,
        /// Constant name.
        constant: String,
    },
    /// The result of running an opcode.
    Opcode {
        /// Opcode mnemonic.
        opcode: String,
        /// Argument cells, in order.
        arguments: Vec<MemoryIndex>,
        /// Types bound to the opcode's generics, by generic id.
        bound_types: BTreeMap<String, Arc<VmType>>,
    },
    /// The result of invoking a callable cell.
    Calling {
        /// Cell holding the callable.
        callable: MemoryIndex,
        /// Cell holding the argument.
        argument: MemoryIndex,
    },
    /// A structure assembled from other cells.
    Structured {
        /// Cell for each key.
        values: BTreeMap<String, MemoryIndex>,
    },
    /// An iterable assembled from other cells.
    Iterable {
        /// Cell for each position.
        values: Vec<MemoryIndex>,
    },
}

impl CellKind {
    /// Lowercase kind name for diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::External { .. } => "external",
            Self::Constant { .. } => "constant",
            Self::Opcode { .. } => "opcode",
            Self::Calling { .. } => "calling",
            Self::Structured { .. } => "structured",
            Self::Iterable { .. } => "iterable",
        }
    }

    /// Every cell index this cell refers to.
    #[must_use]
    pub fn references(&self) -> Vec<MemoryIndex> {
        match self {
            Self::External { .. } | Self::Constant { .. } => Vec::new(),
            Self::Opcode { arguments, .. } => arguments.clone(),
            Self::Calling { callable, argument } => vec![*callable, *argument],
            Self::Structured { values } => values.values().copied().collect(),
            Self::Iterable { values } => values.clone(),
        }
    }
}

/// An immutable, typed memory cell.
#[derive(Clone, Debug)]
pub struct MemoryCell {
    /// Where the cell was defined.
    pub source: Option<SourcePosition>,
    /// Declared type of the cell's value.
    pub ty: Arc<VmType>,
    /// How the value is produced.
    pub kind: CellKind,
}

impl MemoryCell {
    /// Creates a cell.
    #[must_use]
    pub const fn new(ty: Arc<VmType>, kind: CellKind) -> Self {
        Self {
            source: None,
            ty,
            kind,
        }
    }

    /// An external cell.
    #[must_use]
    pub fn external(name: impl Into<String>, ty: Arc<VmType>) -> Self {
        Self::new(ty, CellKind::External { name: name.into() })
    }

    /// A constant reference cell.
    #[must_use]
    pub fn constant(module: impl Into<String>, constant: impl Into<String>, ty: Arc<VmType>) -> Self {
        Self::new(
            ty,
            CellKind::Constant {
                module: module.into(),
                constant: constant.into(),
            },
        )
    }

    /// An opcode cell with no generic bindings.
    #[must_use]
    pub fn opcode(opcode: impl Into<String>, arguments: Vec<MemoryIndex>, ty: Arc<VmType>) -> Self {
        Self::new(
            ty,
            CellKind::Opcode {
                opcode: opcode.into(),
                arguments,
                bound_types: BTreeMap::new(),
            },
        )
    }

    /// A calling cell.
    #[must_use]
    pub const fn calling(callable: MemoryIndex, argument: MemoryIndex, ty: Arc<VmType>) -> Self {
        Self::new(ty, CellKind::Calling { callable, argument })
    }

    /// A structure assembly cell.
    #[must_use]
    pub fn structured<K: Into<String>>(
        values: impl IntoIterator<Item = (K, MemoryIndex)>,
        ty: Arc<VmType>,
    ) -> Self {
        Self::new(
            ty,
            CellKind::Structured {
                values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            },
        )
    }

    /// An iterable assembly cell.
    #[must_use]
    pub const fn iterable(values: Vec<MemoryIndex>, ty: Arc<VmType>) -> Self {
        Self::new(ty, CellKind::Iterable { values })
    }

    /// Binds a generic on an opcode cell. No effect on other kinds.
    #[must_use]
    pub fn with_binding(mut self, generic: impl Into<String>, ty: Arc<VmType>) -> Self {
        if let CellKind::Opcode { bound_types, .. } = &mut self.kind {
            bound_types.insert(generic.into(), ty);
        }
        self
    }

    /// Sets the source position.
    #[must_use]
    pub fn with_source(mut self, source: SourcePosition) -> Self {
        self.source = Some(source);
        self
    }

    /// The cell's own source, falling back to its type's.
    #[must_use]
    pub fn best_source(&self) -> Option<&SourcePosition> {
        self.source.as_ref().or_else(|| self.ty.source())
    }

    /// A child of an external or constant cell, named `parent.sub`.
    /// Used when constants are broken down into per-element cells.
    #[must_use]
    pub fn sub_cell(&self, sub: &str, ty: Arc<VmType>) -> Self {
        let kind = match &self.kind {
            CellKind::Constant { module, constant } => CellKind::Constant {
                module: module.clone(),
                constant: format!("{constant}.{sub}"),
            },
            CellKind::External { name } => CellKind::External {
                name: format!("{name}.{sub}"),
            },
            other => CellKind::External {
                name: format!("{}.{sub}", other.as_str()),
            },
        };
        Self {
            source: self.source.clone(),
            ty,
            kind,
        }
    }
}

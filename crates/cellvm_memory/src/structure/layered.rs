//! A structure built from override layers.

use std::sync::Arc;

use cellvm_foundation::VmType;

use crate::value::{MemoryValue, StructuredValue};

type Layer = im::OrdMap<String, MemoryValue>;

/// A stack of key/value layers scanned front to back.
///
/// Keys come from the structure type, not from the layers. Creating a child
/// prepends a layer and shares every existing layer with the parent.
#[derive(Clone, Debug)]
pub struct LayeredStructured {
    layers: im::Vector<Layer>,
    ty: Arc<VmType>,
}

impl LayeredStructured {
    /// A single-layer structure of the given type.
    #[must_use]
    pub fn new(layer: impl IntoIterator<Item = (String, MemoryValue)>, ty: Arc<VmType>) -> Self {
        Self {
            layers: im::Vector::unit(layer.into_iter().collect()),
            ty,
        }
    }

    /// A child with `layer` overriding this structure, optionally retyped.
    #[must_use]
    pub fn create_child(
        &self,
        layer: impl IntoIterator<Item = (String, MemoryValue)>,
        ty: Option<Arc<VmType>>,
    ) -> Self {
        let mut layers = self.layers.clone();
        layers.push_front(layer.into_iter().collect());
        Self {
            layers,
            ty: ty.unwrap_or_else(|| Arc::clone(&self.ty)),
        }
    }

    /// The structure type.
    #[must_use]
    pub const fn ty(&self) -> &Arc<VmType> {
        &self.ty
    }

    /// Number of layers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl StructuredValue for LayeredStructured {
    fn keys(&self) -> Vec<String> {
        self.ty
            .as_structured()
            .map(|s| s.stores.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn get(&self, key: &str) -> Option<MemoryValue> {
        self.layers.iter().find_map(|layer| layer.get(key).cloned())
    }

    fn contains(&self, key: &str) -> bool {
        self.ty
            .as_structured()
            .is_some_and(|s| s.stores.contains_key(key))
    }

    fn as_layered(&self) -> Option<&LayeredStructured> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{int_of, int_type, ints};
    use cellvm_foundation::TypeRef;

    fn point(keys: &[&str]) -> Arc<VmType> {
        Arc::new(VmType::structured(
            "point",
            keys.iter().map(|k| (*k, TypeRef::from(int_type()))),
        ))
    }

    #[test]
    fn child_overrides_without_touching_parent() {
        let v = ints(&[1, 2, 3]);
        let parent = LayeredStructured::new(
            [("x".to_string(), v[0].clone()), ("y".to_string(), v[1].clone())],
            point(&["x", "y"]),
        );
        let child = parent.create_child([("x".to_string(), v[2].clone())], None);
        assert_eq!(int_of(&child.get("x").unwrap()), 3);
        assert_eq!(int_of(&child.get("y").unwrap()), 2);
        assert_eq!(int_of(&parent.get("x").unwrap()), 1);
        assert_eq!(child.depth(), 2);
        assert_eq!(child.keys(), vec!["x", "y"]);
    }

    #[test]
    fn keys_come_from_type() {
        let v = ints(&[1, 2]);
        let base = LayeredStructured::new(
            [("x".to_string(), v[0].clone()), ("hidden".to_string(), v[1].clone())],
            point(&["x"]),
        );
        assert_eq!(base.keys(), vec!["x"]);
        assert!(!base.contains("hidden"));

        let wider = base.create_child([("y".to_string(), v[1].clone())], Some(point(&["x", "y"])));
        assert_eq!(wider.keys(), vec!["x", "y"]);
        assert!(wider.contains("y"));
        assert_eq!(wider.ty().name(), "point");
    }
}

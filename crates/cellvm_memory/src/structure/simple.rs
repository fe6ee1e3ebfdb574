//! A flat structure backed by a persistent map.

use crate::value::{MemoryValue, StructuredValue};

/// Structure over an `im::OrdMap` of memory values. Used for constants.
#[derive(Clone, Debug, Default)]
pub struct SimpleStructured(im::OrdMap<String, MemoryValue>);

impl SimpleStructured {
    /// Creates a structure from entries.
    #[must_use]
    pub fn new<K: Into<String>>(entries: impl IntoIterator<Item = (K, MemoryValue)>) -> Self {
        Self(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The underlying map.
    #[must_use]
    pub const fn entries(&self) -> &im::OrdMap<String, MemoryValue> {
        &self.0
    }
}

impl StructuredValue for SimpleStructured {
    fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<MemoryValue> {
        self.0.get(key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

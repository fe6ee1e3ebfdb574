//! A flat iterable backed by a persistent vector.

use std::ops::ControlFlow;

use crate::value::{IterContext, IterRange, IterVisitor, IterableValue, MemoryValue};

/// Iterable over an `im::Vector` of memory values. Used for constants.
#[derive(Clone, Debug, Default)]
pub struct SimpleIterable(im::Vector<MemoryValue>);

impl SimpleIterable {
    /// Creates an iterable from values.
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = MemoryValue>) -> Self {
        Self(values.into_iter().collect())
    }
}

impl FromIterator<MemoryValue> for SimpleIterable {
    fn from_iter<I: IntoIterator<Item = MemoryValue>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl IterableValue for SimpleIterable {
    fn size(&self) -> usize {
        self.0.len()
    }

    fn get(&self, index: usize) -> Option<MemoryValue> {
        self.0.get(index).cloned()
    }

    fn for_each_in(&self, range: IterRange, visitor: &mut IterVisitor<'_>) {
        let Some((start, end)) = range.resolve(self.0.len()) else {
            return;
        };
        for (offset, value) in self.0.iter().skip(start).take(end - start).enumerate() {
            let index = start + offset;
            let ctx = IterContext {
                index,
                first: index == start,
                last: index + 1 == end,
            };
            if let ControlFlow::Break(()) = visitor(value, ctx) {
                return;
            }
        }
    }
}

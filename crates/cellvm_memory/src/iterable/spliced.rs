//! A persistent rope of memory values.
//!
//! A [`SpliceNode`] covers a virtual index range `[start, end)` made of an
//! optional `low` subtree, a contiguous `current` run, and an optional
//! `high` subtree. Each node has its own virtual index space; moving into a
//! child is an affine shift anchored at `low_end` (the end of low equals the
//! start of current) or `high_start` (the start of high equals the end of
//! current). The `current` run maps its virtual range onto a window of a
//! shared backing array, so slicing never copies elements.

use std::ops::ControlFlow;
use std::sync::Arc;

use cellvm_foundation::{Problem, ProblemId, Result};

use crate::value::{IterContext, IterRange, IterVisitor, IterableValue, MemoryValue};

// =============================================================================
// Backing runs
// =============================================================================

/// A window `[offset, offset + (end - start))` of `data`, addressed by the
/// virtual indices `[start, end)`.
#[derive(Clone)]
struct SpliceArray {
    start: isize,
    end: isize,
    offset: usize,
    data: Arc<[MemoryValue]>,
}

impl SpliceArray {
    fn empty_at(at: isize) -> Self {
        Self {
            start: at,
            end: at,
            offset: 0,
            data: Arc::from(Vec::new()),
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn from_values(values: Vec<MemoryValue>) -> Self {
        Self {
            start: 0,
            end: values.len() as isize,
            offset: 0,
            data: Arc::from(values),
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn slot(&self, v: isize) -> &MemoryValue {
        &self.data[self.offset + (v - self.start) as usize]
    }

    fn get(&self, v: isize) -> Option<MemoryValue> {
        (v >= self.start && v < self.end).then(|| self.slot(v).clone())
    }

    /// The window restricted to `[from, to)`, keeping virtual indices.
    #[allow(clippy::cast_sign_loss)]
    fn sub_range(&self, from: isize, to: isize) -> Result<Self> {
        if from == to {
            return Ok(Self::empty_at(from));
        }
        if from < self.start || to > self.end || from > to {
            return Err(Problem::new(ProblemId::BAD_SPLICE_RANGE, None)
                .with("source_start", self.start as f64)
                .with("source_end", self.end as f64)
                .with("new_start", from as f64)
                .with("new_end", to as f64));
        }
        Ok(Self {
            start: from,
            end: to,
            offset: self.offset + (from - self.start) as usize,
            data: Arc::clone(&self.data),
        })
    }

    #[allow(clippy::cast_sign_loss)]
    fn visit(
        &self,
        from: isize,
        to: isize,
        base: isize,
        total: (usize, usize),
        visitor: &mut IterVisitor<'_>,
    ) -> ControlFlow<()> {
        for v in from..to {
            let index = (v + base) as usize;
            let ctx = IterContext {
                index,
                first: index == total.0,
                last: index + 1 == total.1,
            };
            visitor(self.slot(v), ctx)?;
        }
        ControlFlow::Continue(())
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// A node of the rope. Cloning is O(1).
#[derive(Clone)]
pub struct SpliceNode {
    start: isize,
    end: isize,
    low_end: isize,
    high_start: isize,
    low: Option<Arc<SpliceNode>>,
    high: Option<Arc<SpliceNode>>,
    current: SpliceArray,
}

impl SpliceNode {
    fn from_parts(low: Option<Arc<Self>>, current: SpliceArray, high: Option<Arc<Self>>) -> Self {
        let low = low.filter(|n| !n.is_empty());
        let high = high.filter(|n| !n.is_empty());
        let low_end = current.start;
        let high_start = current.end;
        let start = low.as_ref().map_or(low_end, |n| low_end - n.len_isize());
        let end = high.as_ref().map_or(high_start, |n| high_start + n.len_isize());
        Self {
            start,
            end,
            low_end,
            high_start,
            low,
            high,
            current,
        }
    }

    /// An empty rope.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_parts(None, SpliceArray::empty_at(0), None)
    }

    /// A single-run rope holding the values.
    #[must_use]
    pub fn from_values(values: Vec<MemoryValue>) -> Self {
        Self::from_parts(None, SpliceArray::from_values(values), None)
    }

    /// Number of elements.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Returns true if the rope has no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    const fn len_isize(&self) -> isize {
        self.end - self.start
    }

    /// Depth of the tree; a single run has depth one.
    #[must_use]
    pub fn depth(&self) -> usize {
        let low = self.low.as_ref().map_or(0, |n| n.depth());
        let high = self.high.as_ref().map_or(0, |n| n.depth());
        1 + low.max(high)
    }

    fn low_shift(low: &Self, low_end: isize) -> isize {
        low.end - low_end
    }

    fn high_shift(high: &Self, high_start: isize) -> isize {
        high.start - high_start
    }

    fn get_virtual(&self, v: isize) -> Option<MemoryValue> {
        if let Some(low) = &self.low {
            if v < self.low_end {
                return low.get_virtual(v + Self::low_shift(low, self.low_end));
            }
        }
        if let Some(high) = &self.high {
            if v >= self.high_start {
                return high.get_virtual(v + Self::high_shift(high, self.high_start));
            }
        }
        self.current.get(v)
    }

    /// Visits virtual indices `[from, to)`, which the caller keeps within
    /// `[start, end)`. `base` converts a virtual index to a public one.
    fn visit(
        &self,
        from: isize,
        to: isize,
        base: isize,
        total: (usize, usize),
        visitor: &mut IterVisitor<'_>,
    ) -> ControlFlow<()> {
        if let Some(low) = &self.low {
            if from < self.low_end {
                let shift = Self::low_shift(low, self.low_end);
                low.visit(
                    from + shift,
                    to.min(self.low_end) + shift,
                    base - shift,
                    total,
                    visitor,
                )?;
            }
        }
        if from < self.current.end && to > self.current.start {
            self.current.visit(
                from.max(self.current.start),
                to.min(self.current.end),
                base,
                total,
                visitor,
            )?;
        }
        if let Some(high) = &self.high {
            if to > self.high_start {
                let shift = Self::high_shift(high, self.high_start);
                high.visit(
                    from.max(self.high_start) + shift,
                    to + shift,
                    base - shift,
                    total,
                    visitor,
                )?;
            }
        }
        ControlFlow::Continue(())
    }

    /// The part of this node within virtual `[from, to)`, sharing structure.
    fn slice_virtual(&self, from: isize, to: isize) -> Result<Self> {
        let low = match &self.low {
            Some(low) if from < self.low_end => {
                let shift = Self::low_shift(low, self.low_end);
                Some(Arc::new(
                    low.slice_virtual(from + shift, to.min(self.low_end) + shift)?,
                ))
            }
            _ => None,
        };
        let cur_from = from.clamp(self.current.start, self.current.end);
        let cur_to = to.clamp(cur_from, self.current.end);
        let current = self.current.sub_range(cur_from, cur_to)?;
        let high = match &self.high {
            Some(high) if to > self.high_start => {
                let shift = Self::high_shift(high, self.high_start);
                Some(Arc::new(
                    high.slice_virtual(from.max(self.high_start) + shift, to + shift)?,
                ))
            }
            _ => None,
        };
        Ok(Self::from_parts(low, current, high))
    }

    // =========================================================================
    // Persistent operations
    // =========================================================================

    /// `self` followed by `other`, in O(1).
    #[must_use]
    pub fn append(&self, other: &Self) -> Self {
        Self::from_parts(
            Some(Arc::new(self.clone())),
            SpliceArray::empty_at(self.end),
            Some(Arc::new(other.clone())),
        )
    }

    /// `self` with one more value at the end.
    #[must_use]
    pub fn push(&self, value: MemoryValue) -> Self {
        self.append(&Self::from_values(vec![value]))
    }

    /// The elements `[start, end)`.
    ///
    /// # Errors
    ///
    /// `INDEX_OUT_OF_RANGE` unless `start <= end <= len`.
    #[allow(clippy::cast_possible_wrap)]
    pub fn sub(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.len() {
            return Err(Problem::new(ProblemId::INDEX_OUT_OF_RANGE, None)
                .with("start", start)
                .with("end", end)
                .with("size", self.len()));
        }
        if start == 0 && end == self.len() {
            return Ok(self.clone());
        }
        self.slice_virtual(self.start + start as isize, self.start + end as isize)
    }

    /// A copy with the element at `index` replaced. A negative index counts
    /// back from the end.
    ///
    /// # Errors
    ///
    /// `INDEX_OUT_OF_RANGE` if the index is outside the rope.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn replace(&self, index: isize, value: MemoryValue) -> Result<Self> {
        let len = self.len_isize();
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return Err(Problem::new(ProblemId::INDEX_OUT_OF_RANGE, None)
                .with("index", index as f64)
                .with("size", self.len()));
        }
        let at = resolved as usize;
        let before = self.sub(0, at)?;
        let after = self.sub(at + 1, self.len())?;
        Ok(Self::from_parts(
            Some(Arc::new(before)),
            SpliceArray::from_values(vec![value]),
            Some(Arc::new(after)),
        ))
    }

    /// A copy with `other` inserted before position `at`.
    ///
    /// # Errors
    ///
    /// `INDEX_OUT_OF_RANGE` if `at > len`.
    pub fn insert(&self, at: usize, other: &Self) -> Result<Self> {
        if at > self.len() {
            return Err(Problem::new(ProblemId::INDEX_OUT_OF_RANGE, None)
                .with("index", at)
                .with("size", self.len()));
        }
        let before = self.sub(0, at)?;
        let after = self.sub(at, self.len())?;
        Ok(before.append(other).append(&after))
    }
}

impl Default for SpliceNode {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for SpliceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpliceNode")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

impl IterableValue for SpliceNode {
    fn size(&self) -> usize {
        self.len()
    }

    #[allow(clippy::cast_possible_wrap)]
    fn get(&self, index: usize) -> Option<MemoryValue> {
        if index >= self.len() {
            return None;
        }
        self.get_virtual(self.start + index as isize)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn for_each_in(&self, range: IterRange, visitor: &mut IterVisitor<'_>) {
        let Some((from, to)) = range.resolve(self.len()) else {
            return;
        };
        let _ = self.visit(
            self.start + from as isize,
            self.start + to as isize,
            -self.start,
            (from, to),
            visitor,
        );
    }

    fn as_splice(&self) -> Option<&SpliceNode> {
        Some(self)
    }
}

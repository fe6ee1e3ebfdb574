//! Ring buffer for debug records.
//!
//! Keeps the most recent records, discarding the oldest when full.

use std::collections::{BTreeMap, VecDeque};

use crate::record::{DebugEvent, DebugRecord};

// =============================================================================
// Debug Buffer
// =============================================================================

/// A bounded buffer of debug records, oldest first.
#[derive(Clone, Debug)]
pub struct DebugBuffer {
    records: VecDeque<DebugRecord>,
    max_size: usize,
    /// Keeps counting across evictions and clears.
    next_id: u64,
}

impl DebugBuffer {
    /// Creates a buffer holding at most `max_size` records.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
            next_id: 0,
        }
    }

    /// Pushes an event, evicting the oldest record if the buffer is full.
    ///
    /// Returns the assigned record id.
    pub fn push(&mut self, depth: usize, event: DebugEvent) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.max_size == 0 {
            return id;
        }
        while self.records.len() >= self.max_size {
            self.records.pop_front();
        }
        self.records.push_back(DebugRecord::new(id, depth, event));
        id
    }

    /// Returns the number of records in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total events pushed, including evicted ones.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.next_id
    }

    /// Clears all records from the buffer.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Returns an iterator over all records.
    pub fn iter(&self) -> impl Iterator<Item = &DebugRecord> {
        self.records.iter()
    }

    /// Returns the most recent N records.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&DebugRecord> {
        let start = self.records.len().saturating_sub(count);
        self.records.iter().skip(start).collect()
    }

    /// Returns records matching a predicate.
    pub fn filter<F>(&self, predicate: F) -> Vec<&DebugRecord>
    where
        F: Fn(&DebugRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }

    /// Returns records of a specific event type.
    #[must_use]
    pub fn by_event_type(&self, event_type: &str) -> Vec<&DebugRecord> {
        self.filter(|r| r.event_type() == event_type)
    }

    /// Returns the number of records of each event type.
    #[must_use]
    pub fn event_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.event_type()).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for DebugBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Offset table for one signal direction
//!
//! Assigns every concrete signal a contiguous slot range inside the flat
//! vector. The assignment only depends on signal names and lengths, never on
//! the order the network happens to enumerate signals in.
//!
//! # Example
//!
//! ```ignore
//! use implicitmap::layout::{LayoutSignal, OffsetTable};
//!
//! let mut table = OffsetTable::new(256);
//! table.rebuild(vec![
//!     LayoutSignal::new(SignalId(7), "b", 1),
//!     LayoutSignal::new(SignalId(8), "a", 2),
//! ]);
//! assert_eq!(table.offset_of(SignalId(8)), Some(0));
//! assert_eq!(table.offset_of(SignalId(7)), Some(2));
//! ```

use crate::types::SignalId;
use std::collections::HashMap;

/// Input to a rebuild: one concrete signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSignal {
    pub id: SignalId,
    pub name: String,
    pub length: usize,
}

impl LayoutSignal {
    pub fn new(id: SignalId, name: impl Into<String>, length: usize) -> Self {
        Self {
            id,
            name: name.into(),
            length,
        }
    }
}

/// One signal's position in the flat vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetEntry {
    pub signal: SignalId,
    pub name: String,
    pub offset: usize,
    pub length: usize,
}

impl OffsetEntry {
    /// One past the last slot this entry covers
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Size before and after a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutChange {
    pub previous_size: usize,
    pub size: usize,
}

impl LayoutChange {
    /// Whether the occupied size moved
    pub fn size_changed(&self) -> bool {
        self.previous_size != self.size
    }
}

/// Sorted, gap-free layout of one direction's concrete signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    entries: Vec<OffsetEntry>,
    index: HashMap<SignalId, usize>,
    size: usize,
    capacity: usize,
}

impl OffsetTable {
    /// Create an empty table whose occupied size never exceeds `capacity`
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            size: 0,
            capacity,
        }
    }

    /// Recompute the whole layout from scratch.
    ///
    /// Entries are sorted by name (ties broken by handle so the order is
    /// total), offsets are the running sum of lengths, and the occupied size
    /// is clamped to the capacity. Entries that start past the capacity keep
    /// their offset; writes through them are truncated by the flat vector.
    pub fn rebuild<I>(&mut self, signals: I) -> LayoutChange
    where
        I: IntoIterator<Item = LayoutSignal>,
    {
        let mut sorted: Vec<LayoutSignal> = signals.into_iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        self.entries.clear();
        self.index.clear();

        let mut offset = 0;
        for sig in sorted {
            self.index.insert(sig.id, self.entries.len());
            self.entries.push(OffsetEntry {
                signal: sig.id,
                name: sig.name,
                offset,
                length: sig.length,
            });
            offset += sig.length;
        }

        let change = LayoutChange {
            previous_size: self.size,
            size: offset.min(self.capacity),
        };
        self.size = change.size;
        change
    }

    /// Entries in layout order
    pub fn entries(&self) -> &[OffsetEntry] {
        &self.entries
    }

    /// Look up a signal's entry
    pub fn entry(&self, signal: SignalId) -> Option<&OffsetEntry> {
        self.index.get(&signal).map(|&i| &self.entries[i])
    }

    /// Offset of a signal, if it is laid out
    pub fn offset_of(&self, signal: SignalId) -> Option<usize> {
        self.entry(signal).map(|e| e.offset)
    }

    /// Occupied length of the flat vector
    pub fn size(&self) -> usize {
        self.size
    }

    /// Maximum occupied length
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of laid-out signals
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no signals are laid out
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

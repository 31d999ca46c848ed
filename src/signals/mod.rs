//! Local signal registry
//!
//! Each direction has one [`SignalBank`]: the generic placeholder, the
//! concrete signals created during negotiation, and the offset table and flat
//! vector that lay those signals out.
//!
//! # Components
//!
//! - [`SignalBank`] - Registry, layout and buffer for one direction
//! - [`LocalSignal`] - A concrete signal mirroring a remote endpoint
//! - [`SignalBindings`] / [`SignalOwner`] - Routing of per-handle callbacks
//! - [`materializer`] - Creation and removal of concrete signals

pub mod bindings;
pub mod materializer;

pub use bindings::{SignalBindings, SignalOwner, Slot, SlotRole};
pub use materializer::Materialized;

use crate::error::{ImplicitMapError, Result};
use crate::layout::{FlatVector, LayoutChange, LayoutSignal, OffsetEntry, OffsetTable, WriteOutcome};
use crate::network::{LocalSignalSpec, MappingNetwork};
use crate::registry::{GENERIC_INPUT_NAME, GENERIC_OUTPUT_NAME};
use crate::types::{Direction, SignalId};
use std::collections::HashMap;

/// A concrete local signal
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSignal {
    pub id: SignalId,
    /// `<peerDevice>/<peerSignal>`
    pub name: String,
    pub direction: Direction,
    pub length: usize,
    pub minimum: Option<Vec<f32>>,
    pub maximum: Option<Vec<f32>>,
    /// Hidden reverse-direction signal that receives query answers (outputs only)
    pub shadow: Option<SignalId>,
    /// Most recent value received (inputs) or sent (outputs)
    pub value: Option<Vec<f32>>,
}

impl LocalSignal {
    /// Latest value, zero-filled to the signal length
    pub fn current_value(&self) -> Vec<f32> {
        let mut v = self.value.clone().unwrap_or_default();
        v.resize(self.length, 0.0);
        v
    }
}

/// Signals, layout and buffer for one direction
#[derive(Debug, Clone)]
pub struct SignalBank {
    direction: Direction,
    placeholder: Option<SignalId>,
    signals: HashMap<SignalId, LocalSignal>,
    table: OffsetTable,
    vector: FlatVector,
    capacity: usize,
}

impl SignalBank {
    /// Create an empty bank holding at most `capacity` signals and cells
    pub fn new(direction: Direction, capacity: usize) -> Self {
        Self {
            direction,
            placeholder: None,
            signals: HashMap::new(),
            table: OffsetTable::new(capacity),
            vector: FlatVector::new(capacity),
            capacity,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Name of this direction's generic placeholder
    pub fn placeholder_name(&self) -> &'static str {
        match self.direction {
            Direction::Incoming => GENERIC_INPUT_NAME,
            Direction::Outgoing => GENERIC_OUTPUT_NAME,
        }
    }

    /// Register the generic placeholder on the network
    pub fn install_placeholder(&mut self, network: &mut dyn MappingNetwork) -> Result<SignalId> {
        if let Some(id) = self.placeholder {
            return Ok(id);
        }
        let spec = LocalSignalSpec::float(self.placeholder_name(), self.direction, 1);
        let id = network.add_signal(&spec)?;
        self.placeholder = Some(id);
        Ok(id)
    }

    pub fn placeholder(&self) -> Option<SignalId> {
        self.placeholder
    }

    pub fn is_placeholder(&self, id: SignalId) -> bool {
        self.placeholder == Some(id)
    }

    /// Number of concrete signals (placeholder excluded)
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Whether another concrete signal can be added
    pub fn is_full(&self) -> bool {
        self.signals.len() >= self.capacity
    }

    pub fn get(&self, id: SignalId) -> Option<&LocalSignal> {
        self.signals.get(&id)
    }

    pub fn get_mut(&mut self, id: SignalId) -> Option<&mut LocalSignal> {
        self.signals.get_mut(&id)
    }

    /// Find a concrete signal by name (leading `/` ignored)
    pub fn find_by_name(&self, name: &str) -> Option<&LocalSignal> {
        let wanted = name.trim_start_matches('/');
        self.signals.values().find(|s| s.name == wanted)
    }

    /// Concrete signals in layout order with their entries
    pub fn layout(&self) -> impl Iterator<Item = (&OffsetEntry, &LocalSignal)> {
        self.table
            .entries()
            .iter()
            .filter_map(|e| self.signals.get(&e.signal).map(|s| (e, s)))
    }

    pub fn table(&self) -> &OffsetTable {
        &self.table
    }

    /// Occupied length of the flat vector
    pub fn size(&self) -> usize {
        self.table.size()
    }

    /// Occupied part of the flat vector
    pub fn vector(&self) -> Vec<f32> {
        self.vector.as_vec(self.table.size())
    }

    /// Recompute the offset table from the current signals.
    ///
    /// The flat vector is re-laid out from each signal's stored value, so
    /// every cell matches the new table afterwards.
    pub fn rebuild(&mut self) -> LayoutChange {
        let change = self.table.rebuild(
            self.signals
                .values()
                .map(|s| LayoutSignal::new(s.id, s.name.clone(), s.length)),
        );
        self.vector.reset();
        for entry in self.table.entries() {
            if let Some(value) = self.signals.get(&entry.signal).and_then(|s| s.value.as_ref()) {
                self.vector.write(entry.offset, value);
            }
        }
        tracing::debug!(
            "{} layout rebuilt: {} signals, size {} -> {}",
            self.direction,
            self.table.len(),
            change.previous_size,
            change.size
        );
        change
    }

    /// Store a value for a concrete signal and copy it into the flat vector
    /// at the signal's current offset. `None` writes zeros.
    ///
    /// Returns `None` if the signal is not laid out.
    pub fn write_value(&mut self, id: SignalId, values: Option<&[f32]>) -> Option<WriteOutcome> {
        let offset = self.table.offset_of(id)?;
        let signal = self.signals.get_mut(&id)?;
        let mut cells: Vec<f32> = values.map(<[f32]>::to_vec).unwrap_or_default();
        cells.resize(signal.length, 0.0);
        let outcome = self.vector.write(offset, &cells);
        signal.value = Some(cells);
        Some(outcome)
    }

    /// The overflow error for a signal whose slot runs past the vector
    pub fn overflow_error(&self, id: SignalId) -> Option<ImplicitMapError> {
        let entry = self.table.entry(id)?;
        let capacity = self.vector.capacity();
        (entry.end() > capacity).then(|| ImplicitMapError::MaxVectorLengthExceeded {
            signal: entry.name.clone(),
            offset: entry.offset,
            length: entry.length,
            capacity,
        })
    }
}

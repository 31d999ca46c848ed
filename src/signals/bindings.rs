//! Handle-to-owner bindings
//!
//! The network reports values and query answers by signal handle. A binding
//! resolves that handle to the slot it belongs to; the owner then looks the
//! slot's current offset up in its offset table.

use crate::types::{Direction, SignalId};
use std::collections::HashMap;

/// What a bound handle delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    /// Value updates for an input
    Value,
    /// Query answers for an output, delivered through its shadow signal
    QueryReply,
}

/// A concrete signal's position in the node, as seen from a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub direction: Direction,
    /// The concrete signal whose offset-table entry locates the data
    pub signal: SignalId,
    pub role: SlotRole,
}

/// Receiver of per-signal network callbacks
pub trait SignalOwner {
    /// An input received new values (`None` when the peer released it)
    fn on_value_changed(&mut self, slot: Slot, values: Option<&[f32]>);

    /// A remote answered a query made for an output (`None` = no value)
    fn on_query_response(&mut self, slot: Slot, values: Option<&[f32]>);
}

/// Map from network handle to slot
#[derive(Debug, Clone, Default)]
pub struct SignalBindings {
    slots: HashMap<SignalId, Slot>,
}

impl SignalBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, handle: SignalId, slot: Slot) {
        self.slots.insert(handle, slot);
    }

    pub fn unbind(&mut self, handle: SignalId) -> Option<Slot> {
        self.slots.remove(&handle)
    }

    pub fn resolve(&self, handle: SignalId) -> Option<Slot> {
        self.slots.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

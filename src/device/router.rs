//! Mapping event router
//!
//! Reacts to maps appearing on and disappearing from this device. A map
//! dropped onto a generic placeholder is negotiated into a concrete signal:
//!
//! 1. maps from a device to itself are released and ignored
//! 2. maps that already land on the concrete signal they describe are left alone
//! 3. the placeholder map is released, freeing the placeholder
//! 4. a concrete signal shaped like the peer end is created and laid out
//! 5. an identity map is made between the concrete signal and the peer
//!
//! Removing such a map removes the concrete signal again.

use super::ImplicitMap;
use crate::error::ImplicitMapError;
use crate::layout::LayoutChange;
use crate::network::IDENTITY_EXPRESSION;
use crate::types::{paths, Direction, MapRecord, RecordEvent, SignalRecord};

/// Which end of a map belongs to this device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalEnd {
    /// Our signal is the source; the peer is the destination
    Source,
    /// Our signal is the destination; the peer is the source
    Destination,
}

impl LocalEnd {
    fn direction(self) -> Direction {
        match self {
            LocalEnd::Source => Direction::Outgoing,
            LocalEnd::Destination => Direction::Incoming,
        }
    }
}

/// Split a map into (local end, local signal, peer signal)
fn split<'a>(map: &'a MapRecord, local_device: &str) -> Option<(LocalEnd, &'a SignalRecord, &'a SignalRecord)> {
    if paths::first_segment_eq(&map.source.device_name, local_device) {
        Some((LocalEnd::Source, &map.source, &map.destination))
    } else if paths::first_segment_eq(&map.destination.device_name, local_device) {
        Some((LocalEnd::Destination, &map.destination, &map.source))
    } else {
        None
    }
}

/// Whether `local` is already the concrete mirror of `peer`
fn mirrors(local: &SignalRecord, peer: &SignalRecord) -> bool {
    local.name.trim_start_matches('/') == peer.full_name()
}

impl ImplicitMap {
    pub(crate) fn on_map(&mut self, map: MapRecord, event: RecordEvent) {
        if !self.is_ready() {
            tracing::debug!("Ignoring map event for {}: device not ready", map.id);
            return;
        }

        if paths::first_segment_eq(&map.source.device_name, &map.destination.device_name) {
            if event == RecordEvent::Added {
                let err = ImplicitMapError::SelfMapping {
                    source_path: map.source.path(),
                    destination_path: map.destination.path(),
                };
                tracing::warn!("{}", err);
                if let Err(e) = self.network.release_map(&map) {
                    tracing::warn!("Could not release {}: {}", map.id, e);
                }
            }
            return;
        }

        match event {
            RecordEvent::Added => self.on_map_added(&map),
            RecordEvent::Removed => self.on_map_removed(&map),
            RecordEvent::Modified => tracing::trace!("{} modified", map.id),
        }
    }

    fn local_device_name(&self) -> Option<String> {
        self.network.device_info().map(|info| info.name)
    }

    fn on_map_added(&mut self, map: &MapRecord) {
        let Some(local_name) = self.local_device_name() else {
            return;
        };
        let Some((end, local, peer)) = split(map, &local_name) else {
            tracing::debug!("{} does not involve this device", map.id);
            return;
        };

        if mirrors(local, peer) {
            tracing::trace!("{} already satisfied by '{}'", map.id, local.name);
            return;
        }

        let direction = end.direction();
        let bank = match direction {
            Direction::Incoming => &self.inputs,
            Direction::Outgoing => &self.outputs,
        };
        if !bank.is_placeholder(local.id) {
            tracing::debug!("{} lands on non-generic signal '{}'; ignoring", map.id, local.name);
            return;
        }

        if let Err(e) = self.network.release_map(map) {
            tracing::warn!("Could not release generic {}: {}", map.id, e);
        }

        if bank.find_by_name(&peer.full_name()).is_some() {
            tracing::debug!("'{}' is already materialized", peer.full_name());
            return;
        }

        self.materialize_peer(direction, peer);
    }

    /// Create the concrete mirror of `peer` and connect it
    fn materialize_peer(&mut self, direction: Direction, peer: &SignalRecord) {
        let bank = match direction {
            Direction::Incoming => &mut self.inputs,
            Direction::Outgoing => &mut self.outputs,
        };

        let made = match bank.materialize(self.network.as_mut(), &mut self.bindings, peer) {
            Ok(made) => made,
            Err(e) => {
                tracing::warn!("{}", e);
                return;
            }
        };

        let (source, destination) = match direction {
            Direction::Outgoing => (made.signal, peer.id),
            Direction::Incoming => (peer.id, made.signal),
        };
        if let Err(e) = self
            .network
            .create_map(source, destination, IDENTITY_EXPRESSION)
        {
            tracing::warn!("Could not map '{}': {}", peer.path(), e);
            let undone = match bank.remove(self.network.as_mut(), &mut self.bindings, made.signal) {
                Ok(change) => change,
                Err(e) => {
                    tracing::warn!("Could not undo '{}': {}", peer.full_name(), e);
                    self.apply_layout_change(direction, made.change);
                    return;
                }
            };
            // Net effect of materialize + remove
            let change = LayoutChange {
                previous_size: made.change.previous_size,
                size: undone.size,
            };
            if change.size_changed() {
                self.apply_layout_change(direction, change);
            }
            return;
        }

        self.apply_layout_change(direction, made.change);
        self.push_count(direction);
    }

    fn on_map_removed(&mut self, map: &MapRecord) {
        let touches_placeholder = [&map.source, &map.destination]
            .iter()
            .any(|s| self.inputs.is_placeholder(s.id) || self.outputs.is_placeholder(s.id));
        if touches_placeholder {
            return;
        }

        let Some(local_name) = self.local_device_name() else {
            return;
        };
        let Some((end, local, peer)) = split(map, &local_name) else {
            return;
        };
        if !mirrors(local, peer) {
            return;
        }

        let direction = end.direction();
        let bank = match direction {
            Direction::Incoming => &mut self.inputs,
            Direction::Outgoing => &mut self.outputs,
        };
        match bank.remove(self.network.as_mut(), &mut self.bindings, local.id) {
            Ok(change) => {
                self.apply_layout_change(direction, change);
                self.push_count(direction);
            }
            Err(ImplicitMapError::UnknownSignal(_)) => {
                tracing::trace!("'{}' already removed", local.name);
            }
            Err(e) => tracing::warn!("Could not remove '{}': {}", local.name, e),
        }
    }
}

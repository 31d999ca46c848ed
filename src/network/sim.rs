//! In-memory mapping network for testing
//!
//! This module provides a simulated bus that stands in for the mapping
//! middleware. The local device talks to it through [`SimNetwork`], while a
//! test (or the demo binary) plays the rest of the network through the shared
//! [`SimBus`] handle: declaring peer devices and signals, dropping peer maps
//! onto this device, pushing peer values and choosing how peers answer
//! queries.
//!
//! # Behaviour
//!
//! - **Readiness**: the local device reports ready after a configurable number
//!   of polls
//! - **Name collisions**: base names get the first free `.<ordinal>` suffix
//! - **Echoes**: every map created or released by the local device comes back
//!   as a map event on a later poll, as it would from a real network
//! - **Queries**: each map leaving a queried output yields one query; peers
//!   answer with their current value, with "no value", or not at all
//! - **Operation log**: everything the local device asks of the network is
//!   recorded as a [`NetworkOp`]; only the newest [`OPS_LOG_CAPACITY`]
//!   entries are kept
//!
//! # Example
//!
//! ```ignore
//! use implicitmap::network::{SimBus, QueryBehavior};
//!
//! let bus = SimBus::new();
//! let synth = bus.add_peer_device("synth");
//! let freq = bus.add_peer_signal(&synth, "freq", Direction::Incoming, 1, ScalarType::Float);
//!
//! let network = bus.network();
//! // hand `network` to the device, then drive the peer side:
//! let generic = bus.placeholder(Direction::Outgoing).unwrap();
//! bus.request_map(generic, freq);
//! bus.set_query_behavior(freq, QueryBehavior::Silent);
//! ```
//!
//! # Enabling
//!
//! The simulation is available when the `mock-network` feature is enabled
//! (on by default).

use super::{LocalSignalSpec, MappingNetwork, NetworkEvent};
use crate::error::{ImplicitMapError, Result};
use crate::registry::{GENERIC_INPUT_NAME, GENERIC_OUTPUT_NAME};
use crate::types::{
    DeviceInfo, Direction, MapId, MapRecord, RangeValues, RecordEvent, ScalarType, SignalId,
    SignalRecord,
};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Maximum number of entries kept in the operation log
pub const OPS_LOG_CAPACITY: usize = 4096;

/// How a peer signal answers value queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryBehavior {
    /// Answer with the current value
    #[default]
    Respond,
    /// Answer, but report that there is no value
    NoValue,
    /// Never answer
    Silent,
}

/// A request the local device made of the network
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkOp {
    CreateDevice { name: String, port: u16 },
    DestroyDevice,
    AddSignal {
        id: SignalId,
        name: String,
        direction: Direction,
        hidden: bool,
    },
    RemoveSignal { id: SignalId },
    CreateMap {
        source: SignalId,
        destination: SignalId,
        expression: String,
    },
    ReleaseMap { map: MapId },
    Query { signal: SignalId, sent: usize },
    Update { signal: SignalId, values: Vec<f32> },
    StartQueue,
    SendQueue,
}

#[derive(Debug, Clone)]
struct SimSignal {
    record: SignalRecord,
    hidden: bool,
    value: Option<Vec<f32>>,
    query: QueryBehavior,
}

#[derive(Debug)]
struct BusState {
    next_handle: u64,
    devices: HashSet<String>,
    signals: BTreeMap<SignalId, SimSignal>,
    maps: BTreeMap<MapId, MapRecord>,
    local_name: Option<String>,
    interface: String,
    port: u16,
    polls: u32,
    ready_after_polls: u32,
    fail_create: bool,
    pending: VecDeque<NetworkEvent>,
    ops: VecDeque<NetworkOp>,
}

impl Default for BusState {
    fn default() -> Self {
        Self {
            next_handle: 1,
            devices: HashSet::new(),
            signals: BTreeMap::new(),
            maps: BTreeMap::new(),
            local_name: None,
            interface: "lo".to_string(),
            port: 0,
            polls: 0,
            ready_after_polls: 1,
            fail_create: false,
            pending: VecDeque::new(),
            ops: VecDeque::new(),
        }
    }
}

impl BusState {
    fn record(&mut self, op: NetworkOp) {
        if self.ops.len() >= OPS_LOG_CAPACITY {
            self.ops.pop_front();
        }
        self.ops.push_back(op);
    }

    fn handle(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn is_local(&self, record: &SignalRecord) -> bool {
        self.local_name.as_deref() == Some(record.device_name.as_str())
    }

    fn involves_local(&self, map: &MapRecord) -> bool {
        self.is_local(&map.source) || self.is_local(&map.destination)
    }

    fn dedupe_name(&self, base: &str) -> String {
        (1u32..)
            .map(|ordinal| format!("{}.{}", base, ordinal))
            .find(|candidate| !self.devices.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn insert_map(&mut self, source: SignalId, destination: SignalId) -> Result<MapId> {
        let src = self
            .signals
            .get(&source)
            .ok_or(ImplicitMapError::UnknownSignal(source.0))?
            .record
            .clone();
        let dst = self
            .signals
            .get(&destination)
            .ok_or(ImplicitMapError::UnknownSignal(destination.0))?
            .record
            .clone();
        let id = MapId(self.handle());
        let map = MapRecord {
            id,
            source: src,
            destination: dst,
        };
        if self.involves_local(&map) {
            self.pending.push_back(NetworkEvent::Map {
                map: map.clone(),
                event: RecordEvent::Added,
            });
        }
        self.maps.insert(id, map);
        Ok(id)
    }

    fn drop_map(&mut self, id: MapId) -> bool {
        match self.maps.remove(&id) {
            Some(map) => {
                if self.involves_local(&map) {
                    self.pending.push_back(NetworkEvent::Map {
                        map,
                        event: RecordEvent::Removed,
                    });
                }
                true
            }
            None => false,
        }
    }

    fn maps_touching(&self, signal: SignalId) -> Vec<MapId> {
        self.maps
            .values()
            .filter(|m| m.source.id == signal || m.destination.id == signal)
            .map(|m| m.id)
            .collect()
    }
}

/// Shared handle to the simulated network
///
/// Cloning the handle shares the same bus.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    state: Arc<Mutex<BusState>>,
}

impl SimBus {
    /// Create an empty bus; the local device becomes ready on its first poll
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `polls` polls before the local device reports ready
    pub fn with_ready_after(self, polls: u32) -> Self {
        self.lock().ready_after_polls = polls;
        self
    }

    /// Make the next device creation fail
    pub fn fail_device_creation(self) -> Self {
        self.lock().fail_create = true;
        self
    }

    /// Network endpoint to hand to the local device
    pub fn network(&self) -> SimNetwork {
        SimNetwork { bus: self.clone() }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ==================== Peer side ====================

    /// Declare a peer device, returning its (deduplicated) name
    pub fn add_peer_device(&self, base_name: &str) -> String {
        let mut state = self.lock();
        let name = state.dedupe_name(base_name);
        state.devices.insert(name.clone());
        name
    }

    /// Declare a signal on a peer device
    pub fn add_peer_signal(
        &self,
        device: &str,
        name: &str,
        direction: Direction,
        length: usize,
        scalar_type: ScalarType,
    ) -> SignalId {
        let mut state = self.lock();
        let id = SignalId(state.handle());
        let record = SignalRecord::new(id, device, name, direction, length, scalar_type);
        state.signals.insert(
            id,
            SimSignal {
                record,
                hidden: false,
                value: None,
                query: QueryBehavior::default(),
            },
        );
        id
    }

    /// Declare the range of a peer signal
    pub fn set_peer_range(&self, signal: SignalId, minimum: RangeValues, maximum: RangeValues) {
        if let Some(sig) = self.lock().signals.get_mut(&signal) {
            sig.record.minimum = Some(minimum);
            sig.record.maximum = Some(maximum);
        }
    }

    /// Set the value a peer signal reports when queried
    pub fn set_peer_value(&self, signal: SignalId, values: Option<Vec<f32>>) {
        if let Some(sig) = self.lock().signals.get_mut(&signal) {
            sig.value = values;
        }
    }

    /// Choose how a peer signal answers queries
    pub fn set_query_behavior(&self, signal: SignalId, behavior: QueryBehavior) {
        if let Some(sig) = self.lock().signals.get_mut(&signal) {
            sig.query = behavior;
        }
    }

    /// Create a map on behalf of a peer (or a mapping session manager)
    pub fn request_map(&self, source: SignalId, destination: SignalId) -> Result<MapId> {
        self.lock().insert_map(source, destination)
    }

    /// Tear a map down on behalf of a peer
    pub fn request_unmap(&self, map: MapId) -> bool {
        self.lock().drop_map(map)
    }

    /// Push a value from a peer output through every map it feeds
    pub fn push_value(&self, source: SignalId, values: Option<Vec<f32>>) {
        let mut state = self.lock();
        if let Some(sig) = state.signals.get_mut(&source) {
            sig.value = values.clone();
        }
        let targets: Vec<SignalRecord> = state
            .maps
            .values()
            .filter(|m| m.source.id == source)
            .map(|m| m.destination.clone())
            .collect();
        for dst in targets {
            if state.is_local(&dst) {
                state.pending.push_back(NetworkEvent::Value {
                    signal: dst.id,
                    values: values.clone(),
                });
            }
        }
    }

    /// Queue an arbitrary event for the local device
    pub fn inject(&self, event: NetworkEvent) {
        self.lock().pending.push_back(event);
    }

    // ==================== Inspection ====================

    /// Name the network assigned to the local device
    pub fn local_device_name(&self) -> Option<String> {
        self.lock().local_name.clone()
    }

    /// Record of any known signal
    pub fn signal(&self, signal: SignalId) -> Option<SignalRecord> {
        self.lock().signals.get(&signal).map(|s| s.record.clone())
    }

    /// Local signal by name (with or without leading `/`)
    pub fn local_signal(&self, name: &str) -> Option<SignalRecord> {
        let state = self.lock();
        let wanted = name.trim_start_matches('/');
        state
            .signals
            .values()
            .find(|s| state.is_local(&s.record) && s.record.name == wanted)
            .map(|s| s.record.clone())
    }

    /// Advertised (non-hidden) local signals of one direction, placeholders included
    pub fn local_signals(&self, direction: Direction) -> Vec<SignalRecord> {
        let state = self.lock();
        state
            .signals
            .values()
            .filter(|s| state.is_local(&s.record) && !s.hidden && s.record.direction == direction)
            .map(|s| s.record.clone())
            .collect()
    }

    /// Hidden local signals
    pub fn hidden_signals(&self) -> Vec<SignalRecord> {
        let state = self.lock();
        state
            .signals
            .values()
            .filter(|s| state.is_local(&s.record) && s.hidden)
            .map(|s| s.record.clone())
            .collect()
    }

    /// The local generic placeholder signal of a direction
    pub fn placeholder(&self, direction: Direction) -> Option<SignalId> {
        let name = match direction {
            Direction::Incoming => GENERIC_INPUT_NAME,
            Direction::Outgoing => GENERIC_OUTPUT_NAME,
        };
        self.local_signal(name).map(|r| r.id)
    }

    /// All live maps
    pub fn maps(&self) -> Vec<MapRecord> {
        self.lock().maps.values().cloned().collect()
    }

    /// Live maps with `signal` at either end
    pub fn maps_involving(&self, signal: SignalId) -> Vec<MapRecord> {
        let state = self.lock();
        state
            .maps_touching(signal)
            .into_iter()
            .filter_map(|id| state.maps.get(&id).cloned())
            .collect()
    }

    /// Last value any signal was given
    pub fn value_of(&self, signal: SignalId) -> Option<Vec<f32>> {
        self.lock().signals.get(&signal).and_then(|s| s.value.clone())
    }

    /// Everything the local device has asked of the network so far
    pub fn ops(&self) -> Vec<NetworkOp> {
        self.lock().ops.iter().cloned().collect()
    }

    /// Forget the operation log
    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    /// Events waiting for the next poll
    pub fn pending_events(&self) -> usize {
        self.lock().pending.len()
    }
}

/// The local device's endpoint on a [`SimBus`]
#[derive(Debug, Clone)]
pub struct SimNetwork {
    bus: SimBus,
}

impl SimNetwork {
    /// The bus this endpoint is attached to
    pub fn bus(&self) -> &SimBus {
        &self.bus
    }
}

impl MappingNetwork for SimNetwork {
    fn create_device(&mut self, name: &str, port: u16, interface: Option<&str>) -> Result<()> {
        let mut state = self.bus.lock();
        if state.fail_create {
            return Err(ImplicitMapError::DeviceInit(format!(
                "could not allocate network identity for '{}'",
                name
            )));
        }
        let assigned = state.dedupe_name(name);
        state.devices.insert(assigned.clone());
        state.local_name = Some(assigned.clone());
        state.port = port;
        if let Some(iface) = interface {
            state.interface = iface.to_string();
        }
        state.polls = 0;
        state.record(NetworkOp::CreateDevice {
            name: assigned.clone(),
            port,
        });
        tracing::debug!("Simulated device '{}' created on port {}", assigned, port);
        Ok(())
    }

    fn destroy_device(&mut self) {
        let mut state = self.bus.lock();
        let Some(name) = state.local_name.take() else {
            return;
        };
        state.devices.remove(&name);
        state.signals.retain(|_, s| s.record.device_name != name);
        state
            .maps
            .retain(|_, m| m.source.device_name != name && m.destination.device_name != name);
        state.pending.clear();
        state.record(NetworkOp::DestroyDevice);
        tracing::debug!("Simulated device '{}' destroyed", name);
    }

    fn poll(&mut self, _timeout_ms: u32) -> Vec<NetworkEvent> {
        let mut state = self.bus.lock();
        if state.local_name.is_none() {
            return Vec::new();
        }
        state.polls = state.polls.saturating_add(1);
        state.pending.drain(..).collect()
    }

    fn is_ready(&self) -> bool {
        let state = self.bus.lock();
        state.local_name.is_some() && state.polls >= state.ready_after_polls
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        let state = self.bus.lock();
        state.local_name.as_ref().map(|name| DeviceInfo {
            name: name.clone(),
            interface: state.interface.clone(),
            ip: Some(Ipv4Addr::LOCALHOST),
            port: state.port,
        })
    }

    fn add_signal(&mut self, spec: &LocalSignalSpec) -> Result<SignalId> {
        let mut state = self.bus.lock();
        let device = state
            .local_name
            .clone()
            .ok_or_else(|| ImplicitMapError::Network("no local device".to_string()))?;
        let id = SignalId(state.handle());
        let mut record = SignalRecord::new(
            id,
            device,
            spec.name.trim_start_matches('/'),
            spec.direction,
            spec.length,
            spec.scalar_type,
        );
        record.minimum = spec.minimum.clone().map(RangeValues::Float);
        record.maximum = spec.maximum.clone().map(RangeValues::Float);
        state.signals.insert(
            id,
            SimSignal {
                record,
                hidden: spec.hidden,
                value: None,
                query: QueryBehavior::default(),
            },
        );
        state.record(NetworkOp::AddSignal {
            id,
            name: spec.name.clone(),
            direction: spec.direction,
            hidden: spec.hidden,
        });
        Ok(id)
    }

    fn remove_signal(&mut self, signal: SignalId) -> Result<()> {
        let mut state = self.bus.lock();
        if state.signals.remove(&signal).is_none() {
            return Err(ImplicitMapError::UnknownSignal(signal.0));
        }
        for map in state.maps_touching(signal) {
            state.drop_map(map);
        }
        state.record(NetworkOp::RemoveSignal { id: signal });
        Ok(())
    }

    fn create_map(
        &mut self,
        source: SignalId,
        destination: SignalId,
        expression: &str,
    ) -> Result<()> {
        let mut state = self.bus.lock();
        state.record(NetworkOp::CreateMap {
            source,
            destination,
            expression: expression.to_string(),
        });
        state.insert_map(source, destination).map(|_| ())
    }

    fn release_map(&mut self, map: &MapRecord) -> Result<()> {
        let mut state = self.bus.lock();
        state.record(NetworkOp::ReleaseMap { map: map.id });
        state.drop_map(map.id);
        Ok(())
    }

    fn query_remotes(&mut self, signal: SignalId, reply_to: SignalId) -> usize {
        let mut state = self.bus.lock();
        let remotes: Vec<SignalId> = state
            .maps
            .values()
            .filter(|m| m.source.id == signal)
            .map(|m| m.destination.id)
            .collect();

        let mut sent = 0;
        for remote in remotes {
            let Some(peer) = state.signals.get(&remote) else {
                continue;
            };
            sent += 1;
            let response = match peer.query {
                QueryBehavior::Respond => Some(peer.value.clone()),
                QueryBehavior::NoValue => Some(None),
                QueryBehavior::Silent => None,
            };
            if let Some(values) = response {
                state.pending.push_back(NetworkEvent::QueryResponse {
                    signal: reply_to,
                    values,
                });
            }
        }
        state.record(NetworkOp::Query { signal, sent });
        sent
    }

    fn update_signal(&mut self, signal: SignalId, values: &[f32]) -> Result<()> {
        let mut state = self.bus.lock();
        let Some(sig) = state.signals.get_mut(&signal) else {
            return Err(ImplicitMapError::UnknownSignal(signal.0));
        };
        sig.value = Some(values.to_vec());
        let destinations: Vec<SignalId> = state
            .maps
            .values()
            .filter(|m| m.source.id == signal)
            .map(|m| m.destination.id)
            .collect();
        for dst in destinations {
            if let Some(peer) = state.signals.get_mut(&dst) {
                peer.value = Some(values.to_vec());
            }
        }
        state.record(NetworkOp::Update {
            signal,
            values: values.to_vec(),
        });
        Ok(())
    }

    fn start_queue(&mut self) {
        self.bus.lock().record(NetworkOp::StartQueue);
    }

    fn send_queue(&mut self) {
        self.bus.lock().record(NetworkOp::SendQueue);
    }
}

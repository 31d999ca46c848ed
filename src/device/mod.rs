//! The implicitmap object instance
//!
//! [`ImplicitMap`] is one node on the mapping network. It owns the network
//! binding, one [`SignalBank`] per direction, the snapshot store and the
//! capture coordinator, and it talks to the host only through an outlet
//! channel.
//!
//! # Tick Atomicity
//!
//! Host messages are never sent directly. Everything a tick or a command
//! produces is collected in an outbox, and the outbox is flushed once at the
//! end. The host therefore never observes a half-applied topology change.
//!
//! # Lifecycle
//!
//! ```text
//! new() --create_device ok--> Registering --is_ready--> Ready
//!   |
//!   +--create_device failed--> Inert (every handler is a no-op)
//! ```
//!
//! Dropping the instance destroys the network device.

pub mod commands;
pub mod router;

use crate::config::AppConfig;
use crate::host::{HostMessage, ObjectArgs};
use crate::layout::{LayoutChange, DEFAULT_CAPACITY};
use crate::network::{MappingNetwork, NetworkEvent};
use crate::registry::{DEFAULT_CLASS_NAME, DEFAULT_PORT};
use crate::signals::{SignalBank, SignalBindings, SignalOwner, Slot, SlotRole};
use crate::snapshot::{CompletedCapture, SnapshotCoordinator, SnapshotStore, DEFAULT_QUERY_TIMEOUT};
use crate::types::{DeviceInfo, Direction};
use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};

/// Construction parameters of one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Base device name
    pub name: String,
    pub port: u16,
    pub interface: Option<String>,
    /// Maximum concrete signals and vector cells per direction
    pub capacity: usize,
    pub query_timeout: Duration,
    /// Maximum network batches drained per tick
    pub max_events_per_tick: usize,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLASS_NAME.to_string(),
            port: DEFAULT_PORT,
            interface: None,
            capacity: DEFAULT_CAPACITY,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_events_per_tick: 64,
        }
    }
}

impl DeviceOptions {
    /// Options from the config file, overridden by construction arguments
    pub fn from_config(config: &AppConfig, args: &ObjectArgs) -> Self {
        Self {
            name: args
                .alias
                .clone()
                .unwrap_or_else(|| config.device.name.clone()),
            port: config.device.port,
            interface: args
                .interface
                .clone()
                .or_else(|| config.device.interface.clone()),
            capacity: config.poll.capacity,
            query_timeout: config.poll.query_timeout(),
            max_events_per_tick: config.poll.max_events_per_tick.max(1),
        }
    }
}

/// Where the instance is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// The network device could not be created
    Inert,
    /// Waiting for the network to finish registration
    Registering,
    Ready,
}

/// One implicitmap node
pub struct ImplicitMap {
    network: Box<dyn MappingNetwork>,
    options: DeviceOptions,
    state: DeviceState,
    inputs: SignalBank,
    outputs: SignalBank,
    bindings: SignalBindings,
    snapshots: SnapshotStore,
    coordinator: SnapshotCoordinator,
    muted: bool,
    /// Set by input callbacks, consumed once per tick
    new_input: bool,
    outbox: Vec<HostMessage>,
    outlet: Sender<HostMessage>,
    dropped_messages: u64,
    rng: StdRng,
}

impl ImplicitMap {
    /// Create the instance and its network device.
    ///
    /// Failure to create the device is logged and leaves the instance inert.
    pub fn new(
        mut network: Box<dyn MappingNetwork>,
        options: DeviceOptions,
        outlet: Sender<HostMessage>,
    ) -> Self {
        tracing::info!("using name: {}", options.name);
        let state = match network.create_device(
            &options.name,
            options.port,
            options.interface.as_deref(),
        ) {
            Ok(()) => DeviceState::Registering,
            Err(e) => {
                tracing::error!("implicitmap: Error initializing: {}", e);
                DeviceState::Inert
            }
        };

        Self {
            network,
            inputs: SignalBank::new(Direction::Incoming, options.capacity),
            outputs: SignalBank::new(Direction::Outgoing, options.capacity),
            coordinator: SnapshotCoordinator::new(options.query_timeout),
            options,
            state,
            bindings: SignalBindings::new(),
            snapshots: SnapshotStore::new(),
            muted: false,
            new_input: false,
            outbox: Vec::new(),
            outlet,
            dropped_messages: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source used by `randomize`
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    // ==================== Accessors ====================

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Ready
    }

    pub fn is_inert(&self) -> bool {
        self.state == DeviceState::Inert
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    /// Network identity, once registered
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.network.device_info()
    }

    pub fn inputs(&self) -> &SignalBank {
        &self.inputs
    }

    pub fn outputs(&self) -> &SignalBank {
        &self.outputs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Queries still outstanding for the capture in flight
    pub fn pending_queries(&self) -> usize {
        self.coordinator.pending()
    }

    /// When the snapshot timeout fires, if armed
    pub fn snapshot_deadline(&self) -> Option<Instant> {
        self.coordinator.deadline()
    }

    /// Messages the outlet channel refused
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    // ==================== Poll Loop ====================

    /// One scheduler tick: drain the network, pass the readiness gate,
    /// fire a due snapshot timeout and publish the input vector if it
    /// changed.
    ///
    /// When the event budget runs out before the network is quiet, the
    /// outbox and the input vector are held until a later tick drains it.
    pub fn tick(&mut self, now: Instant) {
        if self.is_inert() {
            return;
        }

        let mut batches = 0;
        let mut settled = true;
        loop {
            let events = self.network.poll(0);
            if events.is_empty() {
                break;
            }
            tracing::trace!("Network batch of {} events", events.len());
            for event in events {
                self.dispatch(event);
            }
            batches += 1;
            if batches >= self.options.max_events_per_tick {
                tracing::debug!("Event budget reached; continuing next tick");
                settled = false;
                break;
            }
        }

        if self.state == DeviceState::Registering && self.network.is_ready() {
            self.become_ready();
        }

        self.expire_snapshot(now);

        // Publish only once the network has gone quiet
        if !settled {
            return;
        }

        if self.new_input {
            self.outbox.push(HostMessage::InputVector(self.inputs.vector()));
            self.new_input = false;
        }

        self.flush();
    }

    /// Host clock callback for the snapshot timeout
    pub fn fire_timeout(&mut self, now: Instant) {
        self.expire_snapshot(now);
        self.flush();
    }

    fn expire_snapshot(&mut self, now: Instant) {
        if let Some(done) = self.coordinator.expire(now) {
            self.commit_snapshot(done);
        }
    }

    fn become_ready(&mut self) {
        self.state = DeviceState::Ready;
        for bank in [&mut self.outputs, &mut self.inputs] {
            if let Err(e) = bank.install_placeholder(self.network.as_mut()) {
                tracing::warn!("Could not create {} placeholder: {}", bank.direction(), e);
            }
        }
        match self.network.device_info() {
            Some(info) => tracing::info!("Device '{}' ready on port {}", info.name, info.port),
            None => tracing::info!("Device ready"),
        }
        self.print_properties();
    }

    fn dispatch(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Map { map, event } => self.on_map(map, event),
            NetworkEvent::Value { signal, values } => match self.bindings.resolve(signal) {
                Some(slot) if slot.role == SlotRole::Value => {
                    self.on_value_changed(slot, values.as_deref())
                }
                _ => tracing::trace!("Value for unbound signal {}", signal),
            },
            NetworkEvent::QueryResponse { signal, values } => {
                match self.bindings.resolve(signal) {
                    Some(slot) if slot.role == SlotRole::QueryReply => {
                        self.on_query_response(slot, values.as_deref())
                    }
                    _ => tracing::trace!("Query response for unbound signal {}", signal),
                }
            }
        }
    }

    // ==================== Snapshot Store ====================

    fn commit_snapshot(&mut self, done: CompletedCapture) {
        let snapshot = self
            .snapshots
            .commit(done.captured_at, done.inputs, done.outputs);
        let id = snapshot.id;
        let inputs = snapshot.inputs.clone();
        let outputs = snapshot.outputs.clone();
        tracing::info!(
            "Snapshot {} captured ({} in, {} out, {} missing)",
            id,
            inputs.len(),
            outputs.len(),
            done.missing
        );

        self.outbox.push(HostMessage::NumSnapshots(self.snapshots.len()));
        self.outbox.push(HostMessage::SnapshotInputs(inputs));
        self.outbox.push(HostMessage::Outputs(outputs));
        self.outbox.push(HostMessage::SnapshotId(id));
    }

    /// Discard all snapshots and tell the host
    fn clear_snapshots(&mut self) {
        let dropped = self.snapshots.clear();
        tracing::debug!("Cleared {} snapshots", dropped);
        self.outbox.push(HostMessage::Cleared);
        self.outbox.push(HostMessage::NumSnapshots(0));
    }

    /// Invalidate captures that no longer match the layout
    fn apply_layout_change(&mut self, direction: Direction, change: LayoutChange) {
        if self.coordinator.abandon() {
            tracing::warn!("Layout changed during capture; abandoning snapshot");
        }
        if change.size_changed() && !self.snapshots.is_empty() {
            tracing::warn!(
                "implicitmap: {} vector size has changed - resetting snapshots!",
                direction
            );
            self.clear_snapshots();
        }
    }

    fn push_count(&mut self, direction: Direction) {
        let msg = match direction {
            Direction::Incoming => HostMessage::NumInputs(self.inputs.len()),
            Direction::Outgoing => HostMessage::NumOutputs(self.outputs.len()),
        };
        self.outbox.push(msg);
    }

    /// Send everything collected since the last flush
    fn flush(&mut self) {
        for msg in self.outbox.drain(..) {
            if self.outlet.try_send(msg).is_err() {
                self.dropped_messages += 1;
            }
        }
    }
}

impl SignalOwner for ImplicitMap {
    fn on_value_changed(&mut self, slot: Slot, values: Option<&[f32]>) {
        match self.inputs.write_value(slot.signal, values) {
            Some(outcome) => {
                if outcome.is_truncated() {
                    if let Some(err) = self.inputs.overflow_error(slot.signal) {
                        tracing::warn!("implicitmap: {}", err);
                    }
                }
                self.new_input = true;
            }
            None => tracing::trace!("Value for signal {} not in layout", slot.signal),
        }
    }

    fn on_query_response(&mut self, slot: Slot, values: Option<&[f32]>) {
        let Some(entry) = self.outputs.table().entry(slot.signal) else {
            tracing::debug!("Query response for signal {} not in layout", slot.signal);
            return;
        };
        let (offset, length) = (entry.offset, entry.length);
        if let Some(done) = self.coordinator.record_response(offset, length, values) {
            self.commit_snapshot(done);
        }
    }
}

impl Drop for ImplicitMap {
    fn drop(&mut self) {
        if !self.is_inert() {
            self.network.destroy_device();
            tracing::info!("Device '{}' released", self.options.name);
        }
    }
}

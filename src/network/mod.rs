//! Mapping network seam
//!
//! The distributed mapping middleware is an external collaborator. This
//! module defines the narrow interface the node needs from it, so that a real
//! binding and the in-memory simulation are interchangeable.
//!
//! # Event Delivery
//!
//! The middleware is cooperative: nothing happens until [`MappingNetwork::poll`]
//! is called. Instead of invoking callbacks from inside the pump, a poll
//! returns the batch of events it collected. The device drains batches until
//! the network goes quiet, then publishes derived state once.
//!
//! # Components
//!
//! - [`MappingNetwork`] - The trait every network binding implements
//! - [`NetworkEvent`] - Events produced by a poll
//! - [`LocalSignalSpec`] - Shape of a signal this device registers
//! - [`sim`] - In-memory bus with simulated peers (feature-gated)

#[cfg(feature = "mock-network")]
pub mod sim;

use crate::error::Result;
use crate::types::{DeviceInfo, Direction, MapRecord, RecordEvent, ScalarType, SignalId};

#[cfg(feature = "mock-network")]
pub use sim::{NetworkOp, QueryBehavior, SimBus, SimNetwork, OPS_LOG_CAPACITY};

/// Expression installed on every map this device creates
pub const IDENTITY_EXPRESSION: &str = "y=x";

/// Event produced by pumping the network
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// A map involving this device was added, modified or removed
    Map { map: MapRecord, event: RecordEvent },
    /// An input signal of this device received a value (`None` = released)
    Value {
        signal: SignalId,
        values: Option<Vec<f32>>,
    },
    /// A remote answered a query sent on behalf of `signal`
    QueryResponse {
        signal: SignalId,
        values: Option<Vec<f32>>,
    },
}

/// Shape of a signal to register on this device
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSignalSpec {
    pub name: String,
    pub direction: Direction,
    pub length: usize,
    pub scalar_type: ScalarType,
    pub minimum: Option<Vec<f32>>,
    pub maximum: Option<Vec<f32>>,
    /// Hidden signals are not advertised to peers
    pub hidden: bool,
}

impl LocalSignalSpec {
    /// A float signal with no range
    pub fn float(name: impl Into<String>, direction: Direction, length: usize) -> Self {
        Self {
            name: name.into(),
            direction,
            length,
            scalar_type: ScalarType::Float,
            minimum: None,
            maximum: None,
            hidden: false,
        }
    }

    pub fn with_range(mut self, minimum: Option<Vec<f32>>, maximum: Option<Vec<f32>>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Interface to the mapping middleware for one local device
///
/// Implementations must be `Send` so the device can be driven from a worker
/// thread.
pub trait MappingNetwork: Send {
    /// Allocate the device's network identity
    ///
    /// # Arguments
    /// * `name` - Base name; the network may append an ordinal on collision
    /// * `port` - Requested listening port
    /// * `interface` - Optional network interface selector
    fn create_device(&mut self, name: &str, port: u16, interface: Option<&str>) -> Result<()>;

    /// Release the device and everything registered on it
    fn destroy_device(&mut self);

    /// Pump the network without blocking longer than `timeout_ms`
    fn poll(&mut self, timeout_ms: u32) -> Vec<NetworkEvent>;

    /// Whether the device has finished registering on the network
    fn is_ready(&self) -> bool;

    /// Identity and addressing, once registered
    fn device_info(&self) -> Option<DeviceInfo>;

    /// Register a signal on this device
    fn add_signal(&mut self, spec: &LocalSignalSpec) -> Result<SignalId>;

    /// Remove a signal from this device, dropping any maps it is part of
    fn remove_signal(&mut self, signal: SignalId) -> Result<()>;

    /// Request a map between two signals with the given expression
    fn create_map(
        &mut self,
        source: SignalId,
        destination: SignalId,
        expression: &str,
    ) -> Result<()>;

    /// Request that a map be torn down
    fn release_map(&mut self, map: &MapRecord) -> Result<()>;

    /// Ask the remote ends of `signal` for their current value
    ///
    /// Responses arrive later as [`NetworkEvent::QueryResponse`] addressed to
    /// `reply_to`. Returns the number of queries actually sent, which is zero
    /// when nothing is linked.
    fn query_remotes(&mut self, signal: SignalId, reply_to: SignalId) -> usize;

    /// Publish a new value for an output signal
    fn update_signal(&mut self, signal: SignalId, values: &[f32]) -> Result<()>;

    /// Start collecting updates into one timestamped bundle
    fn start_queue(&mut self) {}

    /// Send the bundle started by [`start_queue`](Self::start_queue)
    fn send_queue(&mut self) {}
}

//! Mock construction helpers

use implicitmap::error::Result;
use implicitmap::network::{LocalSignalSpec, MappingNetwork, NetworkEvent};
use implicitmap::types::{DeviceInfo, MapRecord, SignalId};
use mockall::mock;

#[cfg(feature = "mock-network")]
use crossbeam_channel::{unbounded, Receiver};
#[cfg(feature = "mock-network")]
use implicitmap::network::SimBus;
#[cfg(feature = "mock-network")]
use implicitmap::{DeviceOptions, HostMessage, ImplicitMap};
#[cfg(feature = "mock-network")]
use std::time::Instant;

// Scriptable network binding for failure paths the bus cannot produce
mock! {
    pub Network {}

    impl MappingNetwork for Network {
        fn create_device<'a>(&mut self, name: &str, port: u16, interface: Option<&'a str>) -> Result<()>;
        fn destroy_device(&mut self);
        fn poll(&mut self, timeout_ms: u32) -> Vec<NetworkEvent>;
        fn is_ready(&self) -> bool;
        fn device_info(&self) -> Option<DeviceInfo>;
        fn add_signal(&mut self, spec: &LocalSignalSpec) -> Result<SignalId>;
        fn remove_signal(&mut self, signal: SignalId) -> Result<()>;
        fn create_map(&mut self, source: SignalId, destination: SignalId, expression: &str) -> Result<()>;
        fn release_map(&mut self, map: &MapRecord) -> Result<()>;
        fn query_remotes(&mut self, signal: SignalId, reply_to: SignalId) -> usize;
        fn update_signal(&mut self, signal: SignalId, values: &[f32]) -> Result<()>;
        fn start_queue(&mut self);
        fn send_queue(&mut self);
    }
}

/// A device on `bus` that has passed the readiness gate, with the
/// registration messages already drained
#[cfg(feature = "mock-network")]
pub fn ready_device(bus: &SimBus) -> (ImplicitMap, Receiver<HostMessage>) {
    let (tx, rx) = unbounded();
    let mut device = ImplicitMap::new(Box::new(bus.network()), DeviceOptions::default(), tx);
    device.tick(Instant::now());
    assert!(device.is_ready(), "device should be ready after one tick");
    rx.try_iter().count();
    (device, rx)
}

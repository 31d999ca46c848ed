//! Integration tests for the poll loop lifecycle
//!
//! These tests validate the threaded workflow:
//! - Spawning and shutting down the runner
//! - Registration messages reaching the host
//! - Commands round-tripping through the worker

#![cfg(feature = "mock-network")]

mod common;

use common::builders::PeerSignalBuilder;
use common::test_timeout;
use implicitmap::config::AppConfig;
use implicitmap::network::{NetworkOp, SimBus};
use implicitmap::registry::ClassRegistry;
use implicitmap::runner::{DeviceRunner, HostHandle};
use implicitmap::types::Direction;
use implicitmap::HostMessage;
use std::time::{Duration, Instant};

/// Wait until `pred` matches a message or the timeout passes
fn wait_for(host: &HostHandle, pred: impl Fn(&HostMessage) -> bool) -> Option<HostMessage> {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if let Some(msg) = host.recv_timeout(test_timeout()) {
            if pred(&msg) {
                return Some(msg);
            }
        }
    }
    None
}

fn spawn(bus: &SimBus) -> (std::thread::JoinHandle<()>, HostHandle) {
    let (runner, host) = DeviceRunner::new(
        &ClassRegistry::new(),
        &[],
        Box::new(bus.network()),
        &AppConfig::default(),
    );
    (runner.spawn().expect("spawn poll loop"), host)
}

#[test]
fn test_runner_creation_and_shutdown() {
    let bus = SimBus::new();
    let (handle, host) = spawn(&bus);

    let name = wait_for(&host, |m| matches!(m, HostMessage::Name(_)));
    assert_eq!(name, Some(HostMessage::Name("implicitmap.1".to_string())));

    host.shutdown();
    let result = handle.join();
    assert!(result.is_ok(), "Poll loop should exit cleanly");
    assert!(!host.is_running());
    assert!(bus.ops().contains(&NetworkOp::DestroyDevice));
}

#[test]
fn test_list_reaches_peer_through_worker() {
    let bus = SimBus::new();
    let synth = bus.add_peer_device("synth");
    let gain = PeerSignalBuilder::new(&synth, "/gain").input().length(2).build(&bus);
    let (handle, host) = spawn(&bus);

    assert!(wait_for(&host, |m| matches!(m, HostMessage::NumOutputs(0))).is_some());
    let generic = bus.placeholder(Direction::Outgoing).expect("output placeholder");
    bus.request_map(generic, gain).expect("map to placeholder");
    assert!(wait_for(&host, |m| *m == HostMessage::NumOutputs(1)).is_some());

    host.list(vec![0.25, 0.5]);
    let echoed = wait_for(&host, |m| matches!(m, HostMessage::Outputs(_)));
    assert_eq!(echoed, Some(HostMessage::Outputs(vec![0.25, 0.5])));
    assert_eq!(bus.value_of(gain), Some(vec![0.25, 0.5]));

    host.shutdown();
    handle.join().expect("join poll loop");
}

#[test]
fn test_snapshot_through_worker() {
    let bus = SimBus::new();
    let synth = bus.add_peer_device("synth");
    let cutoff = PeerSignalBuilder::new(&synth, "/cutoff")
        .input()
        .value(vec![0.75])
        .build(&bus);
    let (handle, host) = spawn(&bus);

    assert!(wait_for(&host, |m| matches!(m, HostMessage::NumOutputs(0))).is_some());
    let generic = bus.placeholder(Direction::Outgoing).expect("output placeholder");
    bus.request_map(generic, cutoff).expect("map to placeholder");
    assert!(wait_for(&host, |m| *m == HostMessage::NumOutputs(1)).is_some());

    host.snapshot();
    let outputs = wait_for(&host, |m| matches!(m, HostMessage::Outputs(_)));
    assert_eq!(outputs, Some(HostMessage::Outputs(vec![0.75])));
    assert_eq!(
        wait_for(&host, |m| matches!(m, HostMessage::SnapshotId(_))),
        Some(HostMessage::SnapshotId(0))
    );

    host.shutdown();
    handle.join().expect("join poll loop");
}

#[test]
fn test_dropping_host_stops_worker() {
    let bus = SimBus::new();
    let (handle, host) = spawn(&bus);
    drop(host);

    // The loop notices the closed command channel on its next step
    let result = handle.join();
    assert!(result.is_ok());
    assert!(bus.ops().contains(&NetworkOp::DestroyDevice));
}

//! Integration tests for the mapping workflow
//!
//! Drives a device tick by tick against the simulated bus:
//! - Placeholder negotiation in both directions
//! - Layout of several peers and gap closing on unmap
//! - Input vector publication and snapshot capture

#![cfg(feature = "mock-network")]

mod common;

use common::builders::PeerSignalBuilder;
use common::mock_helpers::ready_device;
use common::selectors;
use implicitmap::network::{QueryBehavior, SimBus};
use implicitmap::types::{Direction, RangeValues, ScalarType};
use implicitmap::{HostCommand, HostMessage};
use std::time::{Duration, Instant};

#[test]
fn test_two_peers_share_sorted_output_layout() {
    let bus = SimBus::new();
    let (mut device, rx) = ready_device(&bus);
    let synth = bus.add_peer_device("synth");
    let drums = bus.add_peer_device("drums");
    let cutoff = PeerSignalBuilder::new(&synth, "/cutoff").input().length(2).build(&bus);
    let kick = PeerSignalBuilder::new(&drums, "/kick").input().build(&bus);
    let generic = bus.placeholder(Direction::Outgoing).unwrap();

    bus.request_map(generic, cutoff).unwrap();
    bus.request_map(generic, kick).unwrap();
    device.tick(Instant::now());

    assert_eq!(device.num_outputs(), 2);
    let names: Vec<_> = device
        .outputs()
        .table()
        .entries()
        .iter()
        .map(|e| (e.name.clone(), e.offset))
        .collect();
    assert_eq!(
        names,
        vec![
            ("drums.1/kick".to_string(), 0),
            ("synth.1/cutoff".to_string(), 1),
        ]
    );
    assert_eq!(device.outputs().size(), 3);

    // Counts are published once per direction change
    let counts: Vec<_> = rx.try_iter().collect();
    assert_eq!(counts, vec![HostMessage::NumOutputs(1), HostMessage::NumOutputs(2)]);

    device.handle_command(HostCommand::List(vec![1.0, 0.1, 0.2]), Instant::now());
    assert_eq!(bus.value_of(kick), Some(vec![1.0]));
    assert_eq!(bus.value_of(cutoff), Some(vec![0.1, 0.2]));
}

#[test]
fn test_peer_unmap_closes_gap() {
    let bus = SimBus::new();
    let (mut device, rx) = ready_device(&bus);
    let synth = bus.add_peer_device("synth");
    let a = PeerSignalBuilder::new(&synth, "/a").length(2).build(&bus);
    let b = PeerSignalBuilder::new(&synth, "/b").length(3).build(&bus);
    let generic = bus.placeholder(Direction::Incoming).unwrap();
    bus.request_map(a, generic).unwrap();
    bus.request_map(b, generic).unwrap();
    device.tick(Instant::now());
    assert_eq!(device.inputs().size(), 5);
    rx.try_iter().count();

    let local_a = bus.local_signal("synth.1/a").unwrap();
    let map = bus.maps_involving(local_a.id).pop().unwrap();
    assert!(bus.request_unmap(map.id));
    device.tick(Instant::now());

    assert_eq!(device.num_inputs(), 1);
    assert!(bus.local_signal("synth.1/a").is_none());
    let entries = device.inputs().table().entries();
    assert_eq!(entries[0].name, "synth.1/b");
    assert_eq!(entries[0].offset, 0);
    assert_eq!(device.inputs().size(), 3);
    assert!(rx.try_iter().any(|m| m == HostMessage::NumInputs(1)));
}

#[test]
fn test_input_values_land_at_offsets() {
    let bus = SimBus::new();
    let (mut device, rx) = ready_device(&bus);
    let synth = bus.add_peer_device("synth");
    let y = PeerSignalBuilder::new(&synth, "/y").build(&bus);
    let x = PeerSignalBuilder::new(&synth, "/x").length(2).build(&bus);
    let generic = bus.placeholder(Direction::Incoming).unwrap();
    bus.request_map(y, generic).unwrap();
    bus.request_map(x, generic).unwrap();
    device.tick(Instant::now());
    rx.try_iter().count();

    bus.push_value(y, Some(vec![0.9]));
    device.tick(Instant::now());
    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![HostMessage::InputVector(vec![0.0, 0.0, 0.9])]
    );

    bus.push_value(x, Some(vec![0.1, 0.2]));
    device.tick(Instant::now());
    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![HostMessage::InputVector(vec![0.1, 0.2, 0.9])]
    );

    // A quiet tick publishes nothing
    device.tick(Instant::now());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_snapshot_pairs_inputs_with_queried_outputs() {
    let bus = SimBus::new();
    let (mut device, rx) = ready_device(&bus);
    let synth = bus.add_peer_device("synth");
    let x = PeerSignalBuilder::new(&synth, "/x").build(&bus);
    let gain = PeerSignalBuilder::new(&synth, "/gain")
        .input()
        .scalar_type(ScalarType::Int32)
        .range(RangeValues::Int(vec![0]), RangeValues::Int(vec![10]))
        .value(vec![7.0])
        .build(&bus);
    bus.request_map(x, bus.placeholder(Direction::Incoming).unwrap()).unwrap();
    bus.request_map(bus.placeholder(Direction::Outgoing).unwrap(), gain).unwrap();
    device.tick(Instant::now());
    bus.push_value(x, Some(vec![0.4]));
    device.tick(Instant::now());
    rx.try_iter().count();

    let now = Instant::now();
    device.handle_command(HostCommand::Snapshot, now);
    device.tick(now);

    let msgs: Vec<_> = rx.try_iter().collect();
    assert_eq!(selectors(&msgs), vec!["numSnapshots", "in", "out", "snapshot"]);
    assert_eq!(msgs[1], HostMessage::SnapshotInputs(vec![0.4]));
    assert_eq!(msgs[2], HostMessage::Outputs(vec![7.0]));

    let stored = device.snapshots().latest().unwrap();
    assert_eq!(stored.id, 0);
    assert_eq!(stored.inputs, vec![0.4]);
    assert_eq!(stored.outputs, vec![7.0]);
}

#[test]
fn test_snapshot_timeout_scenario() {
    let bus = SimBus::new();
    let (mut device, rx) = ready_device(&bus);
    let synth = bus.add_peer_device("synth");
    let a = PeerSignalBuilder::new(&synth, "/a").input().value(vec![0.3]).build(&bus);
    let b = PeerSignalBuilder::new(&synth, "/b").input().length(2).build(&bus);
    bus.set_query_behavior(b, QueryBehavior::Silent);
    let generic = bus.placeholder(Direction::Outgoing).unwrap();
    bus.request_map(generic, a).unwrap();
    bus.request_map(generic, b).unwrap();
    device.tick(Instant::now());
    rx.try_iter().count();

    let start = Instant::now();
    device.handle_command(HostCommand::Snapshot, start);
    device.tick(start);
    assert_eq!(device.pending_queries(), 1);
    assert_eq!(device.snapshot_deadline(), Some(start + Duration::from_millis(1000)));

    // Not yet due
    device.tick(start + Duration::from_millis(999));
    assert!(rx.try_recv().is_err());

    device.tick(start + Duration::from_millis(1000));
    let msgs: Vec<_> = rx.try_iter().collect();
    assert_eq!(msgs[2], HostMessage::Outputs(vec![0.3, 0.0, 0.0]));
    assert_eq!(device.pending_queries(), 0);

    // A fresh capture starts after the timeout
    bus.set_query_behavior(b, QueryBehavior::NoValue);
    let later = start + Duration::from_millis(1500);
    device.handle_command(HostCommand::Snapshot, later);
    device.tick(later);
    assert_eq!(device.snapshots().len(), 2);
    assert_eq!(device.snapshots().latest().unwrap().id, 1);
}

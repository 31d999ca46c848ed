//! Tests for the ambient pieces around the device
//!
//! - Config persistence
//! - Console line parsing through the class registry
//! - Network failure paths via a mocked binding

mod common;

use common::mock_helpers::MockNetwork;
use crossbeam_channel::unbounded;
use implicitmap::config::{AppConfig, OutputFormat};
use implicitmap::error::ImplicitMapError;
use implicitmap::host::{format_line, parse_line};
use implicitmap::registry::ClassRegistry;
use implicitmap::types::DeviceInfo;
use implicitmap::{DeviceOptions, HostCommand, HostMessage, ImplicitMap};
use std::net::Ipv4Addr;
use std::time::Instant;

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AppConfig::default();
    config.device.name = "trainer".to_string();
    config.device.interface = Some("lo".to_string());
    config.poll.query_timeout_ms = 250;
    config.logging.format = OutputFormat::Json;
    config.save(&path).unwrap();

    let loaded = AppConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.poll.query_timeout().as_millis(), 250);
}

#[test]
fn test_config_missing_or_partial() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert_eq!(AppConfig::load_or_default(&missing), AppConfig::default());
    assert!(matches!(
        AppConfig::load(&missing),
        Err(ImplicitMapError::Config(_))
    ));

    let partial = dir.path().join("partial.toml");
    std::fs::write(&partial, "[device]\nport = 9100\n").unwrap();
    let loaded = AppConfig::load(&partial).unwrap();
    assert_eq!(loaded.device.port, 9100);
    assert_eq!(loaded.device.name, "implicitmap");
    assert_eq!(loaded.poll, AppConfig::default().poll);

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "[device\n").unwrap();
    assert_eq!(AppConfig::load_or_default(&broken), AppConfig::default());
}

#[test]
fn test_console_lines_through_registry() {
    let registry = ClassRegistry::new();
    let parse = |line: &str| {
        let (selector, atoms) = parse_line(line).expect("non-empty line");
        registry.parse_message(&selector, &atoms)
    };

    assert_eq!(parse("0.5 1 2;").unwrap(), HostCommand::List(vec![0.5, 1.0, 2.0]));
    assert_eq!(parse("mute 1").unwrap(), HostCommand::Mute(true));
    assert_eq!(parse("snapshot").unwrap(), HostCommand::Snapshot);
    assert!(parse("mute").is_err());
    assert!(parse("list 1 two").is_err());
    assert!(matches!(parse("bang"), Err(ImplicitMapError::InvalidMessage(_))));
    assert!(parse_line("# comment").is_none());
}

#[test]
fn test_format_line_layout() {
    assert_eq!(format_line(&HostMessage::Outputs(vec![0.5, 1.0])), "2 out 0.5 1");
    assert_eq!(format_line(&HostMessage::NumSnapshots(3)), "3 numSnapshots 3");
    assert_eq!(
        format_line(&HostMessage::Ip(Ipv4Addr::new(127, 0, 0, 1))),
        "3 IP 127.0.0.1"
    );
}

#[test]
fn test_failed_device_creation_touches_nothing_else() {
    let mut network = MockNetwork::new();
    network
        .expect_create_device()
        .times(1)
        .returning(|_, _, _| Err(ImplicitMapError::DeviceInit("no interface".to_string())));
    // poll/destroy_device have no expectations; calling them would panic

    let (tx, rx) = unbounded();
    let mut device = ImplicitMap::new(Box::new(network), DeviceOptions::default(), tx);
    assert!(device.is_inert());

    let now = Instant::now();
    device.tick(now);
    device.handle_command(HostCommand::Snapshot, now);
    device.handle_command(HostCommand::Print, now);
    device.handle_command(HostCommand::Clear, now);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_placeholder_failure_still_reports_properties() {
    let mut network = MockNetwork::new();
    network.expect_create_device().returning(|_, _, _| Ok(()));
    network.expect_poll().returning(|_| Vec::new());
    network.expect_is_ready().return_const(true);
    network
        .expect_add_signal()
        .times(2)
        .returning(|_| Err(ImplicitMapError::Network("registry full".to_string())));
    network.expect_device_info().returning(|| {
        Some(DeviceInfo {
            name: "implicitmap.1".to_string(),
            interface: "lo".to_string(),
            ip: None,
            port: 9000,
        })
    });
    network.expect_destroy_device().times(1).return_const(());

    let (tx, rx) = unbounded();
    let mut device = ImplicitMap::new(Box::new(network), DeviceOptions::default(), tx);
    device.tick(Instant::now());

    assert!(device.is_ready());
    assert!(device.inputs().placeholder().is_none());
    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![
            HostMessage::Name("implicitmap.1".to_string()),
            HostMessage::Interface("lo".to_string()),
            HostMessage::Port(9000),
            HostMessage::NumInputs(0),
            HostMessage::NumOutputs(0),
        ]
    );
}

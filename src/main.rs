//! implicitmap - console host
//!
//! Runs a single implicitmap instance against the in-memory network with two
//! demo peers, and acts as a line-based host: each stdin line is a host
//! message (`list 0.5 1`, `snapshot`, `mute 1`, ...) and every outlet message
//! is printed to stdout.
//!
//! Usage: `implicitmap [config.toml] [object args...]`

use anyhow::Context;
use implicitmap::{
    config::{default_config_path, AppConfig, OutputFormat},
    host::{format_line, parse_line, Atom, HostMessage},
    network::SimBus,
    registry::ClassRegistry,
    runner::DeviceRunner,
    types::{Direction, ScalarType},
};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1).peekable();
    let config_path = match args.peek() {
        Some(arg) if arg.ends_with(".toml") => args.next().map(PathBuf::from),
        _ => default_config_path(),
    };
    let object_args: Vec<Atom> = args.map(|a| Atom::parse(&a)).collect();

    let config = match &config_path {
        Some(path) => AppConfig::load_or_default(path),
        None => AppConfig::default(),
    };

    // Initialize logging
    let (file_layer, _log_guard) = match &config.logging.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .context("log_file must name a file")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    tracing::info!("Starting implicitmap");
    if let Some(path) = &config_path {
        tracing::debug!("Config path: {:?}", path);
    }

    let registry = ClassRegistry::new();
    let bus = SimBus::new();
    let synth = bus.add_peer_device("synth");
    let peer_out = bus.add_peer_signal(&synth, "/freq", Direction::Outgoing, 1, ScalarType::Float);
    let peer_in = bus.add_peer_signal(&synth, "/gain", Direction::Incoming, 2, ScalarType::Float);
    bus.set_peer_value(peer_out, Some(vec![440.0]));

    let (runner, host) = DeviceRunner::new(&registry, &object_args, Box::new(bus.network()), &config);
    let worker = runner.spawn().context("Failed to spawn poll loop")?;

    connect_demo_peers(&bus, peer_out, peer_in);

    // Outlet printer
    let receiver = host.receiver.clone();
    let format = config.logging.format;
    let printer = std::thread::Builder::new()
        .name("implicitmap-outlets".to_string())
        .spawn(move || {
            for msg in receiver.iter() {
                print_message(&msg, format);
            }
        })
        .context("Failed to spawn outlet printer")?;

    // Console host
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        let Some((selector, atoms)) = parse_line(trimmed) else {
            continue;
        };
        match registry.parse_message(&selector, &atoms) {
            Ok(cmd) => {
                if !host.send_command(cmd) {
                    tracing::warn!("Poll loop is gone");
                    break;
                }
            }
            Err(e) => tracing::error!("{}", e),
        }
    }

    tracing::info!("Shutting down...");
    host.shutdown();
    if worker.join().is_err() {
        tracing::error!("Poll loop panicked");
    }
    drop(host);
    let _ = printer.join();

    Ok(())
}

/// Map the demo peer's signals onto the placeholders once they exist
fn connect_demo_peers(bus: &SimBus, peer_out: implicitmap::SignalId, peer_in: implicitmap::SignalId) {
    let deadline = Instant::now() + Duration::from_secs(2);
    let placeholders = loop {
        match (bus.placeholder(Direction::Incoming), bus.placeholder(Direction::Outgoing)) {
            (Some(input), Some(output)) => break Some((input, output)),
            _ if Instant::now() >= deadline => break None,
            _ => std::thread::sleep(Duration::from_millis(5)),
        }
    };

    let Some((generic_in, generic_out)) = placeholders else {
        tracing::warn!("Device never became ready; demo peers not connected");
        return;
    };

    if let Err(e) = bus.request_map(peer_out, generic_in) {
        tracing::warn!("Demo input map failed: {}", e);
    }
    if let Err(e) = bus.request_map(generic_out, peer_in) {
        tracing::warn!("Demo output map failed: {}", e);
    }
}

fn print_message(msg: &HostMessage, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", format_line(msg)),
        OutputFormat::Json => match msg.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("{}", e),
        },
    }
}

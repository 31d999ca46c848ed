//! Poll loop runner
//!
//! Stands in for the host scheduler: a worker thread ticks the device at the
//! configured interval and hands it host commands between ticks. The host
//! side keeps a [`HostHandle`] for sending commands and reading outlets.
//!
//! # Example
//!
//! ```ignore
//! use implicitmap::{config::AppConfig, network::SimBus, registry::ClassRegistry, runner::DeviceRunner};
//!
//! let registry = ClassRegistry::new();
//! let bus = SimBus::new();
//! let (runner, host) = DeviceRunner::new(&registry, &[], Box::new(bus.network()), &AppConfig::default());
//! let worker = runner.spawn()?;
//!
//! host.snapshot();
//! for msg in host.drain() {
//!     println!("{}", implicitmap::host::format_line(&msg));
//! }
//!
//! host.shutdown();
//! worker.join().ok();
//! ```

use crate::config::AppConfig;
use crate::device::ImplicitMap;
use crate::host::{Atom, HostCommand, HostMessage};
use crate::network::MappingNetwork;
use crate::registry::ClassRegistry;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Host-side handle to a running device
pub struct HostHandle {
    /// Outlet messages from the device
    pub receiver: Receiver<HostMessage>,
    /// Commands to the device
    pub command_sender: Sender<HostCommand>,
    running: Arc<AtomicBool>,
}

impl HostHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<HostMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<HostMessage> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<HostMessage> {
        self.receiver.try_iter().collect()
    }

    /// Send a command to the device
    pub fn send_command(&self, cmd: HostCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn list(&self, values: Vec<f32>) {
        let _ = self.command_sender.send(HostCommand::List(values));
    }

    pub fn snapshot(&self) {
        let _ = self.command_sender.send(HostCommand::Snapshot);
    }

    pub fn randomize(&self) {
        let _ = self.command_sender.send(HostCommand::Randomize);
    }

    pub fn print(&self) {
        let _ = self.command_sender.send(HostCommand::Print);
    }

    pub fn clear(&self) {
        let _ = self.command_sender.send(HostCommand::Clear);
    }

    pub fn mute(&self, muted: bool) {
        let _ = self.command_sender.send(HostCommand::Mute(muted));
    }

    /// Whether the poll loop is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the poll loop; the device is released when the worker exits
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Drives one device on a worker thread
pub struct DeviceRunner {
    device: ImplicitMap,
    command_rx: Receiver<HostCommand>,
    running: Arc<AtomicBool>,
    interval: Duration,
    last_tick: Instant,
}

impl DeviceRunner {
    /// Create a device through the registry along with its host handle
    pub fn new(
        registry: &ClassRegistry,
        args: &[Atom],
        network: Box<dyn MappingNetwork>,
        config: &AppConfig,
    ) -> (Self, HostHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded for backpressure; the device counts what it has to drop
        let (msg_tx, msg_rx) = bounded(10_000);
        let running = Arc::new(AtomicBool::new(true));

        let device = registry.instantiate(args, network, config, msg_tx);

        let runner = Self {
            device,
            command_rx: cmd_rx,
            running: running.clone(),
            interval: config.poll.interval(),
            last_tick: Instant::now(),
        };
        let host = HostHandle {
            receiver: msg_rx,
            command_sender: cmd_tx,
            running,
        };
        (runner, host)
    }

    pub fn device(&self) -> &ImplicitMap {
        &self.device
    }

    /// A handle to stop the loop
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the loop on a named worker thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("implicitmap-poll".to_string())
            .spawn(move || self.run())
    }

    /// Run the loop until stopped; the device is dropped on exit
    pub fn run(mut self) {
        tracing::info!("Poll loop started ({:?} interval)", self.interval);

        while self.running.load(Ordering::SeqCst) {
            self.step(Instant::now());
            self.rate_limit();
        }

        if self.device.dropped_messages() > 0 {
            tracing::warn!(
                "{} host messages were dropped",
                self.device.dropped_messages()
            );
        }
        tracing::info!("Poll loop stopped");
    }

    /// Handle pending commands, then tick once
    pub fn step(&mut self, now: Instant) {
        self.process_commands(now);
        self.device.tick(now);
    }

    fn process_commands(&mut self, now: Instant) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.device.handle_command(cmd, now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    fn rate_limit(&mut self) {
        if self.interval.is_zero() {
            std::thread::yield_now();
            return;
        }

        let elapsed = self.last_tick.elapsed();
        if elapsed < self.interval {
            std::thread::sleep(self.interval - elapsed);
        }

        self.last_tick = Instant::now();
    }
}

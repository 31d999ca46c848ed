//! implicitmap - an implicit mapping node for a signal-mapping network
//!
//! An implicitmap instance sits between a host patch and a distributed
//! signal-mapping network. It advertises one generic input and one generic
//! output placeholder. When a peer maps one of its signals to a placeholder,
//! the node creates a concrete signal mirroring it, re-routes the map and
//! folds the new signal into a flat vector the host can read and write.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  HostCommand   ┌──────────────────────┐   poll/events   ┌────────────────┐
//! │  Host patch  │ ─────────────> │     ImplicitMap      │ <─────────────> │ MappingNetwork │
//! │  (console)   │ <───────────── │  (runner thread)     │                 │ (real or sim)  │
//! └──────────────┘  HostMessage   └──────────────────────┘                 └────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Signal, map and device records shared with the network
//! - [`error`] - Error type and result alias
//! - [`config`] - TOML configuration
//! - [`network`] - The network seam and the in-memory simulation
//! - [`layout`] - Offset table and flat vector
//! - [`signals`] - Per-direction signal banks and materialization
//! - [`snapshot`] - Snapshot capture and storage
//! - [`host`] - Host message vocabulary
//! - [`device`] - The instance itself
//! - [`registry`] - Class registration
//! - [`runner`] - Poll loop on a worker thread
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
//! host.print();
//! if let Some(msg) = host.recv_timeout(std::time::Duration::from_millis(100)) {
//!     println!("{}", implicitmap::host::format_line(&msg));
//! }
//!
//! host.shutdown();
//! worker.join().ok();
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod layout;
pub mod network;
pub mod registry;
pub mod runner;
pub mod signals;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use device::{DeviceOptions, DeviceState, ImplicitMap};
pub use error::{ImplicitMapError, Result};
pub use host::{Atom, HostCommand, HostMessage};
pub use network::{MappingNetwork, NetworkEvent};
pub use registry::ClassRegistry;
pub use runner::{DeviceRunner, HostHandle};
pub use types::{Direction, MapRecord, SignalId, SignalRecord};

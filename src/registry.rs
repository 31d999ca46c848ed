//! Class registry
//!
//! The host knows the object by class name and sends it selector messages.
//! [`ClassRegistry`] is built once at startup and passed to whoever needs to
//! create instances or interpret messages; there is no process-wide state.

use crate::config::AppConfig;
use crate::device::{DeviceOptions, ImplicitMap};
use crate::error::{ImplicitMapError, Result};
use crate::host::{Atom, HostCommand, HostMessage, ObjectArgs};
use crate::network::MappingNetwork;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Class name, also the default device name
pub const DEFAULT_CLASS_NAME: &str = "implicitmap";

/// Default listening port of the network device
pub const DEFAULT_PORT: u16 = 9000;

/// Generic input placeholder; map a peer output here to create an input
pub const GENERIC_INPUT_NAME: &str = "CONNECT_TO_SOURCE";

/// Generic output placeholder; map it to a peer input to create an output
pub const GENERIC_OUTPUT_NAME: &str = "CONNECT_TO_DESTINATION";

/// Registration of the implicitmap class
#[derive(Debug)]
pub struct ClassRegistry {
    class_name: String,
    default_port: u16,
    instances: AtomicUsize,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::with_class_name(DEFAULT_CLASS_NAME)
    }

    pub fn with_class_name(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        tracing::debug!("Registered class '{}'", class_name);
        Self {
            class_name,
            default_port: DEFAULT_PORT,
            instances: AtomicUsize::new(0),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Selectors instances respond to
    pub fn selectors(&self) -> &'static [&'static str] {
        HostCommand::SELECTORS
    }

    pub fn accepts(&self, selector: &str) -> bool {
        self.selectors().contains(&selector)
    }

    /// Interpret a message sent to an instance of this class
    pub fn parse_message(&self, selector: &str, args: &[Atom]) -> Result<HostCommand> {
        if !self.accepts(selector) {
            return Err(ImplicitMapError::InvalidMessage(format!(
                "{}: no method for '{}'",
                self.class_name, selector
            )));
        }
        HostCommand::parse(selector, args)
    }

    /// Create an instance from its construction arguments.
    ///
    /// The instance is always returned; if its network device could not be
    /// created it is inert.
    pub fn instantiate(
        &self,
        args: &[Atom],
        network: Box<dyn MappingNetwork>,
        config: &AppConfig,
        outlet: Sender<HostMessage>,
    ) -> ImplicitMap {
        let object_args = ObjectArgs::parse(args);
        let options = DeviceOptions::from_config(config, &object_args);
        let count = self.instances.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "Creating {} instance #{} as '{}'",
            self.class_name,
            count,
            options.name
        );
        ImplicitMap::new(network, options, outlet)
    }

    /// Instances created so far
    pub fn instance_count(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }
}

//! Configuration module for implicitmap
//!
//! Settings are read from a TOML file. Every field has a default, so a
//! missing file or a partial file is fine.
//!
//! # Config Location
//!
//! The default file lives in the platform config directory:
//! - **Linux**: `~/.config/implicitmap/config.toml`
//! - **macOS**: `~/Library/Application Support/implicitmap/config.toml`
//! - **Windows**: `%APPDATA%\implicitmap\config.toml`
//!
//! # Example
//!
//! ```toml
//! [device]
//! name = "trainer"
//! port = 9000
//!
//! [poll]
//! interval_ms = 1
//! query_timeout_ms = 1000
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Construction arguments given by the host (`@alias`, `@interface`) take
//! precedence over the `[device]` section.

use crate::error::{ImplicitMapError, Result};
use crate::layout::DEFAULT_CAPACITY;
use crate::registry::{DEFAULT_CLASS_NAME, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the platform config directory
pub const APP_DIR: &str = "implicitmap";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default scheduler interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 1;

/// Default snapshot query timeout in milliseconds
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 1000;

/// Default upper bound on network batches drained per tick
pub const DEFAULT_MAX_EVENTS_PER_TICK: usize = 64;

/// Path of the default config file, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ImplicitMapError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            ImplicitMapError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load a config file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ImplicitMapError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ImplicitMapError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            ImplicitMapError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

// ==================== Device Config ====================

/// Network identity of the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base device name; the network may append an ordinal
    pub name: String,

    /// Listening port
    pub port: u16,

    /// Network interface to bind, or the middleware's choice when unset
    pub interface: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLASS_NAME.to_string(),
            port: DEFAULT_PORT,
            interface: None,
        }
    }
}

// ==================== Poll Config ====================

/// Scheduler and capture timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Milliseconds between ticks
    pub interval_ms: u64,

    /// How long a snapshot waits for query answers
    pub query_timeout_ms: u64,

    /// Maximum concrete signals and vector cells per direction
    pub capacity: usize,

    /// Maximum network batches drained in one tick
    pub max_events_per_tick: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            capacity: DEFAULT_CAPACITY,
            max_events_per_tick: DEFAULT_MAX_EVENTS_PER_TICK,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

// ==================== Logging Config ====================

/// Console output format of the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Log level, optional log file and console format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    /// Also write logs to this file
    pub log_file: Option<PathBuf>,

    pub format: OutputFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            format: OutputFormat::Text,
        }
    }
}

//! Core data types for implicitmap
//!
//! This module contains the data structures shared between the network seam,
//! the signal registry and the host-facing layer.
//!
//! # Main Types
//!
//! - [`Direction`] - Whether a signal consumes (input) or produces (output) values
//! - [`ScalarType`] - Wire-level element type of a signal
//! - [`RangeValues`] - A typed per-element range bound reported by a peer
//! - [`SignalRecord`] - Everything the network tells us about one signal
//! - [`MapRecord`] - A directed edge between two signals
//! - [`DeviceInfo`] - This node's identity once registered
//!
//! # Naming
//!
//! Signals are addressed by an OSC-style path `/<device>/<signal>`. Concrete
//! signals created by this node are named `<peerDevice>/<peerSignal>` so that
//! the name alone identifies which remote endpoint they mirror.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Direction of a signal relative to the device that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Receives values from the network
    Incoming,
    /// Sends values to the network
    Outgoing,
}

impl Direction {
    /// The opposite direction
    pub fn reversed(self) -> Self {
        match self {
            Direction::Incoming => Direction::Outgoing,
            Direction::Outgoing => Direction::Incoming,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => write!(f, "input"),
            Direction::Outgoing => write!(f, "output"),
        }
    }
}

/// Element type of a signal on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScalarType {
    /// 32-bit signed integer (`'i'`)
    Int32,
    /// 32-bit float (`'f'`)
    #[default]
    Float,
    /// 64-bit float (`'d'`)
    Double,
}

impl ScalarType {
    /// The single-character type code used by the mapping protocol
    pub fn type_code(self) -> char {
        match self {
            ScalarType::Int32 => 'i',
            ScalarType::Float => 'f',
            ScalarType::Double => 'd',
        }
    }

    /// Parse a protocol type code
    pub fn from_type_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(ScalarType::Int32),
            'f' => Some(ScalarType::Float),
            'd' => Some(ScalarType::Double),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_code())
    }
}

/// A per-element range bound in the peer's own scalar type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RangeValues {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl RangeValues {
    /// Number of elements in the bound
    pub fn len(&self) -> usize {
        match self {
            RangeValues::Int(v) => v.len(),
            RangeValues::Float(v) => v.len(),
            RangeValues::Double(v) => v.len(),
        }
    }

    /// Whether the bound has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The scalar type these values were reported in
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            RangeValues::Int(_) => ScalarType::Int32,
            RangeValues::Float(_) => ScalarType::Float,
            RangeValues::Double(_) => ScalarType::Double,
        }
    }

    /// Coerce to the float representation used for every local signal.
    ///
    /// Integers widen and doubles narrow; precision lost here is accepted.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            RangeValues::Int(v) => v.iter().map(|&x| x as f32).collect(),
            RangeValues::Float(v) => v.clone(),
            RangeValues::Double(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }
}

/// Handle for a signal, issued by the network layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub u64);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sig#{}", self.0)
    }
}

/// Handle for a map, issued by the network layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub u64);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

/// Description of one signal as seen on the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Network handle
    pub id: SignalId,
    /// Name of the device that owns the signal
    pub device_name: String,
    /// Signal name, with or without a leading `/`
    pub name: String,
    /// Direction relative to its owning device
    pub direction: Direction,
    /// Vector length (0 is treated as 1)
    pub length: usize,
    /// Element type
    pub scalar_type: ScalarType,
    /// Optional per-element minimum
    pub minimum: Option<RangeValues>,
    /// Optional per-element maximum
    pub maximum: Option<RangeValues>,
}

impl SignalRecord {
    /// Create a record with no declared range
    pub fn new(
        id: SignalId,
        device_name: impl Into<String>,
        name: impl Into<String>,
        direction: Direction,
        length: usize,
        scalar_type: ScalarType,
    ) -> Self {
        Self {
            id,
            device_name: device_name.into(),
            name: name.into(),
            direction,
            length,
            scalar_type,
            minimum: None,
            maximum: None,
        }
    }

    /// Attach a declared range
    pub fn with_range(mut self, minimum: RangeValues, maximum: RangeValues) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    /// `<device>/<signal>`, the name a local mirror of this signal gets
    pub fn full_name(&self) -> String {
        full_name(&self.device_name, &self.name)
    }

    /// `/<device>/<signal>`
    pub fn path(&self) -> String {
        format!("/{}", self.full_name())
    }

    /// Vector length with the zero-length default applied
    pub fn effective_length(&self) -> usize {
        self.length.max(1)
    }
}

/// Join a device and a signal name as `<device>/<signal>`
pub fn full_name(device_name: &str, signal_name: &str) -> String {
    format!(
        "{}/{}",
        device_name.trim_start_matches('/'),
        signal_name.trim_start_matches('/')
    )
}

/// What happened to a map record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordEvent {
    Added,
    Modified,
    Removed,
}

/// A directed edge between two signals on the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub id: MapId,
    pub source: SignalRecord,
    pub destination: SignalRecord,
}

/// This node's identity after registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Name assigned by the network (base name plus ordinal)
    pub name: String,
    /// Network interface in use
    pub interface: String,
    /// IPv4 address of that interface, when known
    pub ip: Option<Ipv4Addr>,
    /// Listening port
    pub port: u16,
}

/// OSC-style path helpers
pub mod paths {
    /// The first `/`-delimited segment of a path (`"/a/b"` -> `"a"`)
    pub fn first_segment(path: &str) -> &str {
        let trimmed = path.trim_start_matches('/');
        match trimmed.find('/') {
            Some(end) => &trimmed[..end],
            None => trimmed,
        }
    }

    /// Whether two paths agree exactly on their first segment.
    ///
    /// `"/synth.1/freq"` and `"/synth.10/freq"` do not match even though one
    /// is a string prefix of the other.
    pub fn first_segment_eq(a: &str, b: &str) -> bool {
        let a = first_segment(a);
        !a.is_empty() && a == first_segment(b)
    }
}

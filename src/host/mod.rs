//! Host environment messages
//!
//! The patching host talks to the object in selector-plus-atoms messages:
//! commands come in on the single inlet and results leave on three outlets.
//!
//! # Outlets
//!
//! | Outlet | Carries |
//! |--------|---------|
//! | [`Outlet::Inputs`] | the live input vector (`list`) |
//! | [`Outlet::Data`] | snapshot pairs and command echoes (`in`, `out`, `snapshot`, `clear`, ...) |
//! | [`Outlet::Info`] | device properties and counts (`name`, `port`, `numInputs`, ...) |
//!
//! # Console Format
//!
//! The demo binary reads and writes one message per line:
//!
//! ```text
//! > list 0.5 0.25
//! < 2 out 0.5 0.25
//! ```

use crate::error::{ImplicitMapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// One element of a host message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Atom {
    Int(i64),
    Float(f32),
    Symbol(String),
}

impl Atom {
    /// Classify a console token
    pub fn parse(token: &str) -> Self {
        if let Ok(i) = token.parse::<i64>() {
            Atom::Int(i)
        } else if let Ok(f) = token.parse::<f32>() {
            Atom::Float(f)
        } else {
            Atom::Symbol(token.to_string())
        }
    }

    /// Numeric value of the atom, if it has one
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Atom::Int(i) => Some(*i as f32),
            Atom::Float(f) => Some(*f),
            Atom::Symbol(_) => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Atom::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(i) => write!(f, "{}", i),
            Atom::Float(v) => write!(f, "{}", v),
            Atom::Symbol(s) => write!(f, "{}", s),
        }
    }
}

impl From<f32> for Atom {
    fn from(v: f32) -> Self {
        Atom::Float(v)
    }
}

impl From<i64> for Atom {
    fn from(v: i64) -> Self {
        Atom::Int(v)
    }
}

impl From<&str> for Atom {
    fn from(v: &str) -> Self {
        Atom::Symbol(v.to_string())
    }
}

/// Construction-time options given after the class name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectArgs {
    /// `@alias <name>`: device base name, leading `/` stripped
    pub alias: Option<String>,
    /// `@interface <name>`: network interface to bind
    pub interface: Option<String>,
}

impl ObjectArgs {
    /// Scan the argument list for `@alias` and `@interface`.
    ///
    /// An option whose value is missing or not a symbol is ignored, as are
    /// atoms that are not options.
    pub fn parse(args: &[Atom]) -> Self {
        let mut parsed = Self::default();
        let mut i = 0;
        while i < args.len() {
            let key = args[i].as_symbol();
            let value = args.get(i + 1).and_then(Atom::as_symbol);
            match (key, value) {
                (Some("@alias"), Some(v)) => {
                    parsed.alias = Some(v.strip_prefix('/').unwrap_or(v).to_string());
                    i += 1;
                }
                (Some("@interface"), Some(v)) => {
                    parsed.interface = Some(v.to_string());
                    i += 1;
                }
                (Some(k @ ("@alias" | "@interface")), None) => {
                    tracing::warn!("Option '{}' expects a symbol argument", k);
                }
                _ => {}
            }
            i += 1;
        }
        parsed
    }
}

/// Inbound message from the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Bulk write of the output vector
    List(Vec<f32>),
    Snapshot,
    Randomize,
    Print,
    Clear,
    Mute(bool),
    Process,
    Export,
    Import,
}

impl HostCommand {
    /// Every selector the object responds to
    pub const SELECTORS: &'static [&'static str] = &[
        "list",
        "snapshot",
        "randomize",
        "print",
        "clear",
        "mute",
        "process",
        "export",
        "import",
    ];

    pub fn selector(&self) -> &'static str {
        match self {
            HostCommand::List(_) => "list",
            HostCommand::Snapshot => "snapshot",
            HostCommand::Randomize => "randomize",
            HostCommand::Print => "print",
            HostCommand::Clear => "clear",
            HostCommand::Mute(_) => "mute",
            HostCommand::Process => "process",
            HostCommand::Export => "export",
            HostCommand::Import => "import",
        }
    }

    /// Build a command from a selector and its arguments
    pub fn parse(selector: &str, args: &[Atom]) -> Result<Self> {
        let cmd = match selector {
            "list" => {
                let values = args
                    .iter()
                    .map(|a| {
                        a.as_f32().ok_or_else(|| {
                            ImplicitMapError::InvalidMessage(format!(
                                "list element '{}' is not a number",
                                a
                            ))
                        })
                    })
                    .collect::<Result<Vec<f32>>>()?;
                HostCommand::List(values)
            }
            "snapshot" => {
                if !args.is_empty() {
                    tracing::debug!("Ignoring snapshot arguments: {:?}", args);
                }
                HostCommand::Snapshot
            }
            "randomize" => HostCommand::Randomize,
            "print" => HostCommand::Print,
            "clear" => HostCommand::Clear,
            "mute" => {
                let flag = args.first().and_then(Atom::as_f32).ok_or_else(|| {
                    ImplicitMapError::InvalidMessage("mute expects 0 or 1".to_string())
                })?;
                HostCommand::Mute(flag as i64 != 0)
            }
            "process" => HostCommand::Process,
            "export" => HostCommand::Export,
            "import" => HostCommand::Import,
            other => {
                return Err(ImplicitMapError::InvalidMessage(format!(
                    "no method for '{}'",
                    other
                )))
            }
        };
        Ok(cmd)
    }
}

/// The three object outlets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outlet {
    Inputs,
    Data,
    Info,
}

impl Outlet {
    /// 1-based outlet number as the host shows it
    pub fn index(self) -> u8 {
        match self {
            Outlet::Inputs => 1,
            Outlet::Data => 2,
            Outlet::Info => 3,
        }
    }
}

/// Outbound message to the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Current input vector, whenever an input changed
    InputVector(Vec<f32>),
    /// Input half of a snapshot
    SnapshotInputs(Vec<f32>),
    /// Output vector: snapshot output half, list echo, or randomized values
    Outputs(Vec<f32>),
    /// Id of the snapshot just emitted
    SnapshotId(u32),
    /// Snapshots were discarded
    Cleared,
    Processed,
    Exported,
    Imported,
    Name(String),
    Interface(String),
    Ip(Ipv4Addr),
    Port(u16),
    NumInputs(usize),
    NumOutputs(usize),
    NumSnapshots(usize),
}

impl HostMessage {
    pub fn outlet(&self) -> Outlet {
        match self {
            HostMessage::InputVector(_) => Outlet::Inputs,
            HostMessage::SnapshotInputs(_)
            | HostMessage::Outputs(_)
            | HostMessage::SnapshotId(_)
            | HostMessage::Cleared
            | HostMessage::Processed
            | HostMessage::Exported
            | HostMessage::Imported => Outlet::Data,
            HostMessage::Name(_)
            | HostMessage::Interface(_)
            | HostMessage::Ip(_)
            | HostMessage::Port(_)
            | HostMessage::NumInputs(_)
            | HostMessage::NumOutputs(_)
            | HostMessage::NumSnapshots(_) => Outlet::Info,
        }
    }

    pub fn selector(&self) -> &'static str {
        match self {
            HostMessage::InputVector(_) => "list",
            HostMessage::SnapshotInputs(_) => "in",
            HostMessage::Outputs(_) => "out",
            HostMessage::SnapshotId(_) => "snapshot",
            HostMessage::Cleared => "clear",
            HostMessage::Processed => "process",
            HostMessage::Exported => "export",
            HostMessage::Imported => "import",
            HostMessage::Name(_) => "name",
            HostMessage::Interface(_) => "interface",
            HostMessage::Ip(_) => "IP",
            HostMessage::Port(_) => "port",
            HostMessage::NumInputs(_) => "numInputs",
            HostMessage::NumOutputs(_) => "numOutputs",
            HostMessage::NumSnapshots(_) => "numSnapshots",
        }
    }

    pub fn atoms(&self) -> Vec<Atom> {
        fn floats(v: &[f32]) -> Vec<Atom> {
            v.iter().copied().map(Atom::Float).collect()
        }
        match self {
            HostMessage::InputVector(v)
            | HostMessage::SnapshotInputs(v)
            | HostMessage::Outputs(v) => floats(v),
            HostMessage::SnapshotId(id) => vec![Atom::Int(i64::from(*id))],
            HostMessage::Cleared
            | HostMessage::Processed
            | HostMessage::Exported
            | HostMessage::Imported => Vec::new(),
            HostMessage::Name(s) | HostMessage::Interface(s) => vec![Atom::Symbol(s.clone())],
            HostMessage::Ip(ip) => vec![Atom::Symbol(ip.to_string())],
            HostMessage::Port(p) => vec![Atom::Int(i64::from(*p))],
            HostMessage::NumInputs(n) | HostMessage::NumOutputs(n) | HostMessage::NumSnapshots(n) => {
                vec![Atom::Int(*n as i64)]
            }
        }
    }

    /// JSON object with `outlet`, `selector` and `atoms`
    pub fn to_json(&self) -> Result<String> {
        let line = JsonMessage {
            outlet: self.outlet().index(),
            selector: self.selector(),
            atoms: self.atoms(),
        };
        serde_json::to_string(&line).map_err(|e| ImplicitMapError::InvalidMessage(e.to_string()))
    }
}

#[derive(Serialize)]
struct JsonMessage<'a> {
    outlet: u8,
    selector: &'a str,
    atoms: Vec<Atom>,
}

/// Split one console line into a selector and its atoms.
///
/// Returns `None` for blank lines and `#` comments. A trailing `;` is
/// dropped, and a line starting with a number is an implicit `list`.
pub fn parse_line(line: &str) -> Option<(String, Vec<Atom>)> {
    let line = line.trim().trim_end_matches(';').trim_end();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    let rest = tokens.map(Atom::parse);
    match Atom::parse(first) {
        Atom::Symbol(selector) => Some((selector, rest.collect())),
        number => Some(("list".to_string(), std::iter::once(number).chain(rest).collect())),
    }
}

/// Render an outbound message as `<outlet> <selector> <atoms...>`
pub fn format_line(message: &HostMessage) -> String {
    let mut line = format!("{} {}", message.outlet().index(), message.selector());
    for atom in message.atoms() {
        line.push(' ');
        line.push_str(&atom.to_string());
    }
    line
}

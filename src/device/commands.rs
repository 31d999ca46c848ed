//! Host command handlers

use super::ImplicitMap;
use crate::error::{ImplicitMapError, Result};
use crate::host::{HostCommand, HostMessage};
use crate::types::SignalId;
use rand::Rng;
use std::time::Instant;

impl ImplicitMap {
    /// Handle one inbound host message and flush what it produced.
    ///
    /// Every failure is logged here; none reaches the host.
    pub fn handle_command(&mut self, cmd: HostCommand, now: Instant) {
        if self.is_inert() {
            return;
        }
        tracing::trace!("Host command '{}'", cmd.selector());
        let result = match cmd {
            HostCommand::List(values) => self.list(&values),
            HostCommand::Snapshot => self.snapshot(now),
            HostCommand::Randomize => self.randomize(),
            HostCommand::Print => {
                self.print_properties();
                Ok(())
            }
            HostCommand::Clear => {
                self.clear_snapshots();
                Ok(())
            }
            HostCommand::Mute(muted) => {
                self.muted = muted;
                Ok(())
            }
            HostCommand::Process => self.echo(HostMessage::Processed),
            HostCommand::Export => self.echo(HostMessage::Exported),
            HostCommand::Import => self.echo(HostMessage::Imported),
        };

        match result {
            Ok(()) => {}
            Err(ImplicitMapError::NotReady) => tracing::debug!("Ignoring command: device not ready"),
            Err(e) => tracing::warn!("{}", e),
        }
        self.flush();
    }

    /// Emit name, interface, IP, port and signal counts on the info outlet
    pub fn print_properties(&mut self) {
        if !self.is_ready() {
            return;
        }
        let Some(info) = self.network.device_info() else {
            return;
        };
        self.outbox.push(HostMessage::Name(info.name));
        self.outbox.push(HostMessage::Interface(info.interface));
        if let Some(ip) = info.ip {
            self.outbox.push(HostMessage::Ip(ip));
        }
        self.outbox.push(HostMessage::Port(info.port));
        self.outbox.push(HostMessage::NumInputs(self.inputs.len()));
        self.outbox.push(HostMessage::NumOutputs(self.outputs.len()));
    }

    /// Write a full output vector, one slice per concrete output
    fn list(&mut self, values: &[f32]) -> Result<()> {
        if self.muted {
            return Ok(());
        }
        if !self.is_ready() {
            return Err(ImplicitMapError::NotReady);
        }
        let expected = self.outputs.size();
        if values.len() != expected {
            return Err(ImplicitMapError::VectorSizeMismatch {
                expected,
                actual: values.len(),
            });
        }

        let updates: Vec<(SignalId, Vec<f32>)> = self
            .outputs
            .layout()
            .map(|(entry, _)| {
                let end = entry.end().min(values.len());
                (entry.signal, values[entry.offset.min(end)..end].to_vec())
            })
            .collect();
        self.send_updates(updates);

        self.outbox.push(HostMessage::Outputs(values.to_vec()));
        Ok(())
    }

    /// Give every concrete output a uniform random value within its range
    fn randomize(&mut self) -> Result<()> {
        if !self.is_ready() {
            return Err(ImplicitMapError::NotReady);
        }

        let rng = &mut self.rng;
        let updates: Vec<(SignalId, Vec<f32>)> = self
            .outputs
            .layout()
            .map(|(_, signal)| {
                let values = (0..signal.length)
                    .map(|i| {
                        let r: f32 = rng.gen();
                        let lo = signal.minimum.as_ref().and_then(|m| m.get(i));
                        let hi = signal.maximum.as_ref().and_then(|m| m.get(i));
                        match (lo, hi) {
                            (Some(lo), Some(hi)) => r * (hi - lo) + lo,
                            _ => r,
                        }
                    })
                    .collect();
                (signal.id, values)
            })
            .collect();
        self.send_updates(updates);

        self.outbox.push(HostMessage::Outputs(self.outputs.vector()));
        Ok(())
    }

    /// Start a snapshot capture
    fn snapshot(&mut self, now: Instant) -> Result<()> {
        if !self.is_ready() {
            return Err(ImplicitMapError::NotReady);
        }
        self.coordinator
            .begin(self.inputs.vector(), self.outputs.size())?;

        let targets: Vec<(SignalId, SignalId)> = self
            .outputs
            .layout()
            .filter_map(|(_, signal)| signal.shadow.map(|shadow| (signal.id, shadow)))
            .collect();

        self.network.start_queue();
        let sent: usize = targets
            .into_iter()
            .map(|(signal, shadow)| self.network.query_remotes(signal, shadow))
            .sum();
        self.network.send_queue();
        tracing::debug!("sent {} queries", sent);

        if let Some(done) = self.coordinator.dispatched(sent, now) {
            self.commit_snapshot(done);
        }
        Ok(())
    }

    /// Publish output values as one bundle and mirror them in the output vector
    fn send_updates(&mut self, updates: Vec<(SignalId, Vec<f32>)>) {
        self.network.start_queue();
        for (signal, values) in updates {
            if let Some(outcome) = self.outputs.write_value(signal, Some(&values)) {
                if outcome.is_truncated() {
                    if let Some(err) = self.outputs.overflow_error(signal) {
                        tracing::warn!("implicitmap: {}", err);
                    }
                }
            }
            if let Err(e) = self.network.update_signal(signal, &values) {
                tracing::warn!("Could not update {}: {}", signal, e);
            }
        }
        self.network.send_queue();
    }

    fn echo(&mut self, message: HostMessage) -> Result<()> {
        self.outbox.push(message);
        Ok(())
    }
}

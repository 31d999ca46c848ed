//! Signal materializer
//!
//! Creates a concrete local signal shaped like a remote peer's signal and
//! registers it with the bank, and removes such signals again.
//!
//! Every concrete signal is a float signal regardless of what the peer
//! declared; the peer's range is coerced to float along with it. Outputs also
//! get a hidden, reverse-direction shadow signal through which answers to
//! value queries come back.

use super::{LocalSignal, SignalBank, SignalBindings, Slot, SlotRole};
use crate::error::{ImplicitMapError, Result, ResultExt};
use crate::layout::LayoutChange;
use crate::network::{LocalSignalSpec, MappingNetwork};
use crate::types::{Direction, SignalId, SignalRecord};

/// A freshly created concrete signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Materialized {
    pub signal: SignalId,
    pub shadow: Option<SignalId>,
    pub change: LayoutChange,
}

impl SignalBank {
    /// Create a concrete signal mirroring `peer` and lay it out.
    ///
    /// The local name is the peer's full name. The offset table is rebuilt
    /// before returning, so the returned layout change already reflects the
    /// new signal.
    pub fn materialize(
        &mut self,
        network: &mut dyn MappingNetwork,
        bindings: &mut SignalBindings,
        peer: &SignalRecord,
    ) -> Result<Materialized> {
        if self.is_full() {
            return Err(ImplicitMapError::CapacityExceeded {
                direction: self.direction,
                capacity: self.capacity,
            });
        }

        let name = peer.full_name();
        let length = peer.effective_length();
        let minimum = peer.minimum.as_ref().map(|r| r.to_f32());
        let maximum = peer.maximum.as_ref().map(|r| r.to_f32());

        let spec = LocalSignalSpec::float(name.clone(), self.direction, length)
            .with_range(minimum.clone(), maximum.clone());
        let signal = network
            .add_signal(&spec)
            .with_context(|| format!("Could not create {} '{}'", self.direction, name))?;

        let shadow = match self.direction {
            Direction::Incoming => {
                bindings.bind(
                    signal,
                    Slot {
                        direction: self.direction,
                        signal,
                        role: SlotRole::Value,
                    },
                );
                None
            }
            Direction::Outgoing => {
                let shadow_spec = LocalSignalSpec {
                    direction: Direction::Incoming,
                    ..spec.clone()
                }
                .hidden();
                let shadow = match network.add_signal(&shadow_spec) {
                    Ok(id) => id,
                    Err(e) => {
                        if let Err(cleanup) = network.remove_signal(signal) {
                            tracing::warn!("Could not remove '{}' after failure: {}", name, cleanup);
                        }
                        return Err(e);
                    }
                };
                bindings.bind(
                    shadow,
                    Slot {
                        direction: self.direction,
                        signal,
                        role: SlotRole::QueryReply,
                    },
                );
                Some(shadow)
            }
        };

        tracing::info!(
            "Created {} signal '{}' (length {}, from {} '{}')",
            self.direction,
            name,
            length,
            peer.scalar_type,
            peer.path()
        );

        self.signals.insert(
            signal,
            LocalSignal {
                id: signal,
                name,
                direction: self.direction,
                length,
                minimum,
                maximum,
                shadow,
                value: None,
            },
        );

        let change = self.rebuild();
        Ok(Materialized {
            signal,
            shadow,
            change,
        })
    }

    /// Remove a concrete signal (and its shadow) and rebuild the layout
    pub fn remove(
        &mut self,
        network: &mut dyn MappingNetwork,
        bindings: &mut SignalBindings,
        id: SignalId,
    ) -> Result<LayoutChange> {
        let signal = self
            .signals
            .remove(&id)
            .ok_or(ImplicitMapError::UnknownSignal(id.0))?;

        bindings.unbind(signal.id);
        if let Err(e) = network.remove_signal(signal.id) {
            tracing::warn!("Network refused to remove '{}': {}", signal.name, e);
        }
        if let Some(shadow) = signal.shadow {
            bindings.unbind(shadow);
            if let Err(e) = network.remove_signal(shadow) {
                tracing::warn!("Network refused to remove shadow of '{}': {}", signal.name, e);
            }
        }

        tracing::info!("Removed {} signal '{}'", self.direction, signal.name);
        Ok(self.rebuild())
    }
}

#[cfg(all(test, feature = "mock-network"))]
mod tests {
    use super::*;
    use crate::network::{NetworkOp, SimBus};
    use crate::types::{RangeValues, ScalarType};

    fn setup() -> (SimBus, crate::network::SimNetwork) {
        let bus = SimBus::new();
        let mut net = bus.network();
        net.create_device("implicitmap", 9000, None).unwrap();
        net.poll(0);
        (bus, net)
    }

    fn peer(id: u64, name: &str, length: usize, scalar_type: ScalarType) -> SignalRecord {
        SignalRecord::new(SignalId(id), "synth.1", name, Direction::Outgoing, length, scalar_type)
    }

    #[test]
    fn test_int_range_coerced_to_float() {
        let (_bus, mut net) = setup();
        let mut bank = SignalBank::new(Direction::Incoming, 256);
        let mut bindings = SignalBindings::new();
        let rec = peer(1000, "/x", 3, ScalarType::Int32)
            .with_range(RangeValues::Int(vec![0, 0, 0]), RangeValues::Int(vec![1, 1, 1]));

        let made = bank.materialize(&mut net, &mut bindings, &rec).unwrap();
        let sig = bank.get(made.signal).unwrap();

        assert_eq!(sig.length, 3);
        assert_eq!(sig.name, "synth.1/x");
        assert_eq!(sig.minimum, Some(vec![0.0, 0.0, 0.0]));
        assert_eq!(sig.maximum, Some(vec![1.0, 1.0, 1.0]));
        assert_eq!(made.shadow, None);
        assert_eq!(
            bindings.resolve(made.signal).map(|s| s.role),
            Some(SlotRole::Value)
        );
    }

    #[test]
    fn test_zero_length_defaults_to_one() {
        let (_bus, mut net) = setup();
        let mut bank = SignalBank::new(Direction::Incoming, 256);
        let mut bindings = SignalBindings::new();
        let made = bank
            .materialize(&mut net, &mut bindings, &peer(1, "z", 0, ScalarType::Double))
            .unwrap();
        assert_eq!(bank.get(made.signal).unwrap().length, 1);
        assert_eq!(made.change.size, 1);
    }

    #[test]
    fn test_output_gets_hidden_shadow() {
        let (bus, mut net) = setup();
        let mut bank = SignalBank::new(Direction::Outgoing, 256);
        let mut bindings = SignalBindings::new();
        let made = bank
            .materialize(&mut net, &mut bindings, &peer(1, "freq", 2, ScalarType::Float))
            .unwrap();

        let shadow = made.shadow.expect("outputs have a shadow");
        let slot = bindings.resolve(shadow).unwrap();
        assert_eq!(slot.signal, made.signal);
        assert_eq!(slot.role, SlotRole::QueryReply);
        assert!(bindings.resolve(made.signal).is_none());

        let hidden = bus.hidden_signals();
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].direction, Direction::Incoming);
    }

    #[test]
    fn test_capacity_exceeded() {
        let (bus, mut net) = setup();
        let mut bank = SignalBank::new(Direction::Incoming, 2);
        let mut bindings = SignalBindings::new();
        bank.materialize(&mut net, &mut bindings, &peer(1, "a", 1, ScalarType::Float))
            .unwrap();
        bank.materialize(&mut net, &mut bindings, &peer(2, "b", 1, ScalarType::Float))
            .unwrap();
        bus.clear_ops();

        let err = bank
            .materialize(&mut net, &mut bindings, &peer(3, "c", 1, ScalarType::Float))
            .unwrap_err();
        assert!(matches!(err, ImplicitMapError::CapacityExceeded { capacity: 2, .. }));
        assert!(bus.ops().is_empty());
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn test_remove_drops_shadow_and_rebuilds() {
        let (bus, mut net) = setup();
        let mut bank = SignalBank::new(Direction::Outgoing, 256);
        let mut bindings = SignalBindings::new();
        let a = bank
            .materialize(&mut net, &mut bindings, &peer(1, "a", 2, ScalarType::Float))
            .unwrap();
        let b = bank
            .materialize(&mut net, &mut bindings, &peer(2, "b", 1, ScalarType::Float))
            .unwrap();
        assert_eq!(bank.table().offset_of(b.signal), Some(2));

        let change = bank.remove(&mut net, &mut bindings, a.signal).unwrap();
        assert_eq!(change, LayoutChange { previous_size: 3, size: 1 });
        assert_eq!(bank.table().offset_of(b.signal), Some(0));
        assert!(bindings.resolve(a.shadow.unwrap()).is_none());
        assert!(bus
            .ops()
            .contains(&NetworkOp::RemoveSignal { id: a.shadow.unwrap() }));
    }
}

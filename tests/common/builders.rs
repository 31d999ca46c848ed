//! Test data builders for creating test objects

use implicitmap::network::SimBus;
use implicitmap::types::{Direction, RangeValues, ScalarType, SignalId};

/// Builder for a peer signal on the simulated bus
pub struct PeerSignalBuilder {
    device: String,
    name: String,
    direction: Direction,
    length: usize,
    scalar_type: ScalarType,
    range: Option<(RangeValues, RangeValues)>,
    value: Option<Vec<f32>>,
}

impl PeerSignalBuilder {
    /// A float output of length 1 on `device`
    pub fn new(device: &str, name: &str) -> Self {
        Self {
            device: device.to_string(),
            name: name.to_string(),
            direction: Direction::Outgoing,
            length: 1,
            scalar_type: ScalarType::Float,
            range: None,
            value: None,
        }
    }

    pub fn input(mut self) -> Self {
        self.direction = Direction::Incoming;
        self
    }

    pub fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn scalar_type(mut self, scalar_type: ScalarType) -> Self {
        self.scalar_type = scalar_type;
        self
    }

    pub fn range(mut self, minimum: RangeValues, maximum: RangeValues) -> Self {
        self.range = Some((minimum, maximum));
        self
    }

    pub fn value(mut self, values: Vec<f32>) -> Self {
        self.value = Some(values);
        self
    }

    pub fn build(self, bus: &SimBus) -> SignalId {
        let id = bus.add_peer_signal(
            &self.device,
            &self.name,
            self.direction,
            self.length,
            self.scalar_type,
        );
        if let Some((minimum, maximum)) = self.range {
            bus.set_peer_range(id, minimum, maximum);
        }
        if self.value.is_some() {
            bus.set_peer_value(id, self.value);
        }
        id
    }
}

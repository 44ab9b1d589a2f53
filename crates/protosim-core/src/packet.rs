use serde::{Deserialize, Serialize};

/// The application-layer payload carried end to end.
///
/// This is intentionally a bare string: the simulator's application
/// layer is synthetic (see `Simulator::from_network_layer` in
/// `protosim-engine`), so there is no real byte encoding to model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub data: String,
}

impl Packet {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

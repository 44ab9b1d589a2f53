use crate::frame::Frame;

/// A kernel event, as delivered by the engine to a protocol.
///
/// This is the Rust realization of spec §3's tagged `Event` variant:
/// a real enum rather than a string-keyed discriminant, so dispatch in
/// `protosim-engine` and any `match` in a protocol is checked
/// exhaustively by the compiler.
#[derive(Debug, Clone)]
pub enum Event {
    FrameArrival(Frame),
    ChecksumError,
    Timeout(u32),
    AckTimeout,
    NetworkLayerReady,
}

impl Event {
    /// Stable name used in the event trace / snapshot.
    pub fn name(&self) -> &'static str {
        match self {
            Event::FrameArrival(_) => "FRAME_ARRIVAL",
            Event::ChecksumError => "CKSUM_ERR",
            Event::Timeout(_) => "TIMEOUT",
            Event::AckTimeout => "ACK_TIMEOUT",
            Event::NetworkLayerReady => "NETWORK_LAYER_READY",
        }
    }
}

/// Opaque handle identifying one scheduled timer instance.
///
/// Two `TimerToken`s compare equal only if they were produced by the
/// same `schedule` call. The engine keeps the most recent token issued
/// for a given timer key; an event carrying a stale token is discarded
/// on extraction (spec §4.2 step 3) instead of being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    pub(crate) time_bits: u64,
    pub(crate) id: u64,
}

impl TimerToken {
    pub fn new(time: f64, id: u64) -> Self {
        Self {
            time_bits: time.to_bits(),
            id,
        }
    }
}

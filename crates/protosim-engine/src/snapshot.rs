use serde::Serialize;

use protosim_core::Frame;

use crate::engine::Simulator;

/// Serializable summary of one finished (or paused) run, grounded on
/// the teacher's `SimulationReport` (`tcp-lab-abstract/src/trace.rs`)
/// but shaped around this crate's frame/packet model instead of TCP
/// headers.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub duration: f64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub frames_corrupted: u64,
    pub messages_delivered: u64,
    pub events_dispatched: u64,
    pub tx_log: Vec<(f64, Frame)>,
    pub rx_log: Vec<(f64, String)>,
}

impl Snapshot {
    pub fn capture(sim: &Simulator) -> Self {
        Self {
            duration: sim.now(),
            frames_sent: sim.tx_log().len() as u64,
            frames_dropped: sim.dropped(),
            frames_corrupted: sim.corrupted(),
            messages_delivered: sim.rx_log().len() as u64,
            events_dispatched: sim.event_log().len() as u64,
            tx_log: sim.tx_log().to_vec(),
            rx_log: sim.rx_log().to_vec(),
        }
    }

    /// Fraction of frames handed to `to_physical_layer` that neither
    /// were dropped nor arrived corrupted.
    pub fn goodput(&self) -> f64 {
        if self.frames_sent == 0 {
            return 0.0;
        }
        let clean = self.frames_sent - self.frames_dropped - self.frames_corrupted;
        clean as f64 / self.frames_sent as f64
    }

    /// Data frames transmitted per message actually delivered to the
    /// application layer; 1.0 is perfect, higher means retransmission
    /// overhead. `None` if nothing was ever delivered.
    pub fn efficiency(&self) -> Option<f64> {
        if self.messages_delivered == 0 {
            return None;
        }
        let data_frames = self
            .tx_log
            .iter()
            .filter(|(_, frame)| frame.kind == protosim_core::FrameKind::Data)
            .count() as u64;
        Some(data_frames as f64 / self.messages_delivered as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protosim_core::{Direction, EventApi, Protocol, SimConfig};

    struct OneShot;
    impl Protocol for OneShot {
        fn init(&mut self, ctx: &mut dyn EventApi) {
            ctx.enable_network_layer();
        }
        fn on_network_layer_ready(&mut self, ctx: &mut dyn EventApi) {
            let packet = ctx.from_network_layer();
            ctx.to_physical_layer(Frame::data(0, 0, packet, Direction::AtoB));
            ctx.disable_network_layer();
        }
        fn on_frame_arrival(&mut self, ctx: &mut dyn EventApi, frame: Frame) {
            ctx.to_network_layer(frame.info);
        }
    }

    #[test]
    fn snapshot_reports_full_goodput_with_no_faults() {
        let mut sim = Simulator::new(SimConfig::default(), Box::new(OneShot));
        sim.run(10);
        let snap = Snapshot::capture(&sim);
        assert_eq!(snap.frames_sent, 1);
        assert_eq!(snap.frames_dropped, 0);
        assert_eq!(snap.messages_delivered, 1);
        assert_eq!(snap.goodput(), 1.0);
        assert_eq!(snap.efficiency(), Some(1.0));
    }

    #[test]
    fn efficiency_is_none_when_nothing_was_delivered() {
        let sim = Simulator::new(SimConfig::default(), Box::new(OneShot));
        let snap = Snapshot::capture(&sim);
        assert_eq!(snap.efficiency(), None);
    }
}

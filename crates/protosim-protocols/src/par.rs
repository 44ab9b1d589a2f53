use protosim_core::{Direction, EventApi, Frame, FrameKind, Packet, Protocol};

use crate::common::inc;

const MAX_SEQ: u32 = 1;

/// Positive Acknowledgement with Retransmission: functionally the same
/// alternating-bit shape as [`crate::stop_and_wait::StopAndWait`], kept
/// as its own type because the reference implementations
/// (`PAR/par.py`'s `ParSender`/`ParReceiver`) diverge in one detail —
/// the receiver here re-sends an ACK for every `DATA` frame it sees,
/// in-order or not, rather than only replying while waiting on a
/// specific bit.
#[derive(Debug, Default)]
pub struct Par {
    next_to_send: u32,
    waiting_ack: bool,
    out_buf: Option<Packet>,
    frame_expected: u32,
}

impl Par {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Protocol for Par {
    fn init(&mut self, ctx: &mut dyn EventApi) {
        ctx.enable_network_layer();
    }

    fn on_network_layer_ready(&mut self, ctx: &mut dyn EventApi) {
        if self.waiting_ack {
            return;
        }
        let packet = ctx.from_network_layer();
        let packet = Packet::new(format!("A>{}", packet.data));
        self.out_buf = Some(packet.clone());
        let seq = self.next_to_send;
        ctx.to_physical_layer(Frame::data(seq, 0, packet, Direction::AtoB));
        ctx.start_timer(seq);
        self.waiting_ack = true;
        ctx.disable_network_layer();
    }

    fn on_frame_arrival(&mut self, ctx: &mut dyn EventApi, frame: Frame) {
        match frame.kind {
            FrameKind::Ack => {
                if self.waiting_ack && frame.ack == self.next_to_send {
                    ctx.stop_timer(self.next_to_send);
                    self.out_buf = None;
                    self.next_to_send = inc(self.next_to_send, MAX_SEQ);
                    self.waiting_ack = false;
                    ctx.enable_network_layer();
                }
            }
            FrameKind::Data => {
                if frame.seq == self.frame_expected {
                    ctx.to_network_layer(frame.info);
                    self.frame_expected = inc(self.frame_expected, MAX_SEQ);
                }
                let ack_seq = (self.frame_expected + 1) % 2;
                ctx.to_physical_layer(Frame::ack(ack_seq, Packet::new("ACK:B"), Direction::BtoA));
            }
            FrameKind::Nak => {}
        }
    }

    fn on_timeout(&mut self, ctx: &mut dyn EventApi, seq_key: u32) {
        if !self.waiting_ack || seq_key != self.next_to_send {
            return;
        }
        if let Some(packet) = self.out_buf.clone() {
            ctx.to_physical_layer(Frame::data(seq_key, 0, packet, Direction::AtoB));
            ctx.start_timer(seq_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protosim_core::SimConfig;
    use protosim_engine::run_for_steps;

    #[test]
    fn delivers_in_order_with_a_perfect_channel() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 1.0,
            ..SimConfig::default()
        };
        let snap = run_for_steps(config, Box::new(Par::new()), 40).unwrap();
        assert!(snap.messages_delivered >= 4);
        for (_, data) in &snap.rx_log {
            assert!(data.starts_with("A>MSG_"));
        }
        for pair in snap.rx_log.windows(2) {
            let a: u64 = pair[0].1.trim_start_matches("A>MSG_").parse().unwrap();
            let b: u64 = pair[1].1.trim_start_matches("A>MSG_").parse().unwrap();
            assert_eq!(b, a + 1);
        }
    }

    #[test]
    fn recovers_from_repeated_corruption_via_timeout() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 0.03,
            corrupt_prob: 0.4,
            seed: 7,
            ..SimConfig::default()
        };
        let snap = run_for_steps(config, Box::new(Par::new()), 400).unwrap();
        assert!(snap.messages_delivered >= 3);
    }
}

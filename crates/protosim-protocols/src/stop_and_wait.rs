use protosim_core::{Direction, EventApi, Frame, FrameKind, Packet, Protocol};

use crate::common::inc;

const MAX_SEQ: u32 = 1;

/// One alternating-bit sender plus its companion receiver, merged into
/// a single state machine.
///
/// The original `Stop_and_wait.py` runs `sender_sw` and `receiver_sw`
/// as two independently-polling functions that each call
/// `wait_for_event()` against the *same* global queue — whichever one
/// happens to call first steals the other's event. Folding both roles
/// into one `Protocol` removes that race entirely: a `FrameArrival`
/// carrying a `Data` frame is always routed to the receiver logic, one
/// carrying `Ack` to the sender logic, in the same callback.
#[derive(Debug, Default)]
pub struct StopAndWait {
    next_seq: u32,
    buffered: Option<Packet>,
    waiting_ack: bool,
    expected: u32,
}

impl StopAndWait {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_data(&self, ctx: &mut dyn EventApi, packet: Packet) {
        ctx.to_physical_layer(Frame::data(self.next_seq, 0, packet, Direction::AtoB));
    }
}

impl Protocol for StopAndWait {
    fn init(&mut self, ctx: &mut dyn EventApi) {
        ctx.enable_network_layer();
    }

    fn on_network_layer_ready(&mut self, ctx: &mut dyn EventApi) {
        if self.waiting_ack {
            return;
        }
        let packet = ctx.from_network_layer();
        let packet = Packet::new(format!("A>{}", packet.data));
        self.buffered = Some(packet.clone());
        self.send_data(ctx, packet);
        ctx.start_timer(self.next_seq);
        self.waiting_ack = true;
        ctx.disable_network_layer();
    }

    fn on_frame_arrival(&mut self, ctx: &mut dyn EventApi, frame: Frame) {
        match frame.kind {
            FrameKind::Ack if self.waiting_ack => {
                if frame.ack == self.next_seq {
                    ctx.stop_timer(self.next_seq);
                    self.next_seq = inc(self.next_seq, MAX_SEQ);
                    self.buffered = None;
                    self.waiting_ack = false;
                    ctx.enable_network_layer();
                }
            }
            FrameKind::Data => {
                let ack_bit = if frame.seq == self.expected {
                    ctx.to_network_layer(frame.info);
                    let acked = self.expected;
                    self.expected = inc(self.expected, MAX_SEQ);
                    acked
                } else {
                    1 - self.expected
                };
                ctx.to_physical_layer(Frame::ack(ack_bit, Packet::new("ACK:B"), Direction::BtoA));
            }
            FrameKind::Ack | FrameKind::Nak => {}
        }
    }

    fn on_timeout(&mut self, ctx: &mut dyn EventApi, seq_key: u32) {
        if !self.waiting_ack || seq_key != self.next_seq {
            return;
        }
        if let Some(packet) = self.buffered.clone() {
            self.send_data(ctx, packet);
            ctx.start_timer(self.next_seq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protosim_core::SimConfig;
    use protosim_engine::run_for_steps;

    #[test]
    fn delivers_every_message_with_a_perfect_channel() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 1.0,
            ..SimConfig::default()
        };
        let snap = run_for_steps(config, Box::new(StopAndWait::new()), 40).unwrap();
        assert!(snap.messages_delivered >= 4);
        assert_eq!(snap.frames_dropped, 0);
    }

    #[test]
    fn retransmits_after_loss_and_still_delivers_in_order() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 0.03,
            loss_prob: 0.3,
            seed: 42,
            ..SimConfig::default()
        };
        let snap = run_for_steps(config, Box::new(StopAndWait::new()), 400).unwrap();
        assert!(snap.messages_delivered >= 3);
        for (_, data) in &snap.rx_log {
            assert!(data.starts_with("A>MSG_"));
        }
        for pair in snap.rx_log.windows(2) {
            let a: u64 = pair[0].1.trim_start_matches("A>MSG_").parse().unwrap();
            let b: u64 = pair[1].1.trim_start_matches("A>MSG_").parse().unwrap();
            assert_eq!(b, a + 1);
        }
    }
}

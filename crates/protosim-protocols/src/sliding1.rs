use std::collections::HashMap;

use protosim_core::{Direction, EventApi, Frame, FrameKind, Packet, Protocol};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::common::{EpochGuard, TX_OFFSET_B, inc, tx_offset};

/// One endpoint's full-duplex state: its own one-frame send window
/// plus the receive side of the frame flowing the other way. Ported
/// from `SlidingWindow/slidingWindow.py`'s `SW1Peer`.
#[derive(Debug)]
struct Peer {
    own_direction: Direction,
    seq: u32,
    ack_expected: u32,
    waiting: bool,
    out_buf: HashMap<u32, Packet>,
    frame_expected: u32,
    ack_pending_seq: Option<u32>,
}

impl Peer {
    fn new(own_direction: Direction) -> Self {
        Self {
            own_direction,
            seq: 0,
            ack_expected: 0,
            waiting: false,
            out_buf: HashMap::new(),
            frame_expected: 0,
            ack_pending_seq: None,
        }
    }

    fn has_space(&self) -> bool {
        !self.waiting
    }

    fn last_in_order(&self) -> u32 {
        inc(self.frame_expected, 1)
    }

    fn timer_key(&self, seq: u32) -> u32 {
        tx_offset(self.own_direction) + seq
    }

    fn tx_push_new(&mut self, ctx: &mut dyn EventApi, guard: &mut EpochGuard) {
        let seq = self.seq;
        let key = self.timer_key(seq);
        if guard.should_skip(key) {
            return;
        }
        let packet = ctx.from_network_layer();
        let packet = Packet::new(format!("{}>{}", self.own_direction.tag(), packet.data));
        self.out_buf.insert(seq, packet.clone());
        let ack_pb = self
            .ack_pending_seq
            .take()
            .unwrap_or_else(|| self.last_in_order());
        ctx.to_physical_layer(Frame::data(seq, ack_pb, packet, self.own_direction));
        guard.mark_sent(key);
        ctx.start_timer(key);
        self.waiting = true;
        self.ack_expected = seq;
    }

    fn tx_consume_ack(&mut self, ctx: &mut dyn EventApi, a: u32) {
        if self.waiting && a == self.ack_expected {
            ctx.stop_timer(self.timer_key(self.ack_expected));
            self.out_buf.remove(&self.ack_expected);
            self.waiting = false;
            self.seq = inc(self.seq, 1);
            self.ack_expected = inc(self.ack_expected, 1);
        }
    }

    fn tx_timeout(&mut self, ctx: &mut dyn EventApi, seq: u32, guard: &mut EpochGuard) {
        if !self.waiting || seq != self.ack_expected {
            return;
        }
        let key = self.timer_key(seq);
        if guard.should_skip(key) {
            return;
        }
        let ack_pb = self
            .ack_pending_seq
            .take()
            .unwrap_or_else(|| self.last_in_order());
        let packet = self
            .out_buf
            .get(&seq)
            .cloned()
            .expect("buffered packet missing on timeout");
        ctx.to_physical_layer(Frame::data(seq, ack_pb, packet, self.own_direction));
        guard.mark_sent(key);
        ctx.start_timer(key);
    }

    fn rx_handle_data(&mut self, ctx: &mut dyn EventApi, r_seq: u32, info: Packet) {
        if r_seq == self.frame_expected {
            ctx.to_network_layer(info);
            self.frame_expected = inc(self.frame_expected, 1);
        }
        self.ack_pending_seq = Some(self.last_in_order());
    }
}

/// The 1-bit (window size 1) bidirectional sliding-window protocol:
/// both ends send and receive data, piggybacking acknowledgements on
/// data frames and falling back to a deferred pure-`Ack` frame after
/// `ack_timeout`. Ported from `slidingWindow.py`'s `run_sw1`, with the
/// "who goes first" 50/50 coin flip kept (there it reads from the
/// process-global `random` module) but now owned by this protocol's
/// own seeded RNG instead.
pub struct SlidingWindow1Bit {
    a: Peer,
    b: Peer,
    ack_owner: Option<Direction>,
    guard: EpochGuard,
    rng: StdRng,
}

impl SlidingWindow1Bit {
    pub fn new(seed: u64) -> Self {
        Self {
            a: Peer::new(Direction::AtoB),
            b: Peer::new(Direction::BtoA),
            ack_owner: None,
            guard: EpochGuard::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn rearm(&self, ctx: &mut dyn EventApi) {
        if self.a.has_space() || self.b.has_space() {
            ctx.enable_network_layer();
        } else {
            ctx.disable_network_layer();
        }
    }
}

impl Protocol for SlidingWindow1Bit {
    fn init(&mut self, ctx: &mut dyn EventApi) {
        ctx.enable_network_layer();
    }

    fn on_network_layer_ready(&mut self, ctx: &mut dyn EventApi) {
        self.guard.advance();
        let winner_is_a = self.rng.random_bool(0.5);

        if winner_is_a {
            if self.a.has_space() {
                self.a.tx_push_new(ctx, &mut self.guard);
                if self.ack_owner == Some(Direction::AtoB) {
                    ctx.stop_ack_timer();
                    self.ack_owner = None;
                }
            }
        } else if self.b.has_space() {
            self.b.tx_push_new(ctx, &mut self.guard);
            if self.ack_owner == Some(Direction::BtoA) {
                ctx.stop_ack_timer();
                self.ack_owner = None;
            }
        }

        self.rearm(ctx);
    }

    fn on_frame_arrival(&mut self, ctx: &mut dyn EventApi, frame: Frame) {
        match frame.kind {
            FrameKind::Data => {
                if frame.direction == Direction::AtoB {
                    self.b.rx_handle_data(ctx, frame.seq, frame.info);
                    self.b.tx_consume_ack(ctx, frame.ack);
                    self.ack_owner = Some(Direction::BtoA);
                } else {
                    self.a.rx_handle_data(ctx, frame.seq, frame.info);
                    self.a.tx_consume_ack(ctx, frame.ack);
                    self.ack_owner = Some(Direction::AtoB);
                }
                ctx.stop_ack_timer();
                ctx.start_ack_timer();
                self.rearm(ctx);
            }
            FrameKind::Ack => {
                if frame.direction == Direction::AtoB {
                    self.b.tx_consume_ack(ctx, frame.ack);
                } else {
                    self.a.tx_consume_ack(ctx, frame.ack);
                }
                self.rearm(ctx);
            }
            FrameKind::Nak => {}
        }
    }

    fn on_ack_timeout(&mut self, ctx: &mut dyn EventApi) {
        match self.ack_owner {
            Some(Direction::AtoB) => {
                let ack_seq = self
                    .a
                    .ack_pending_seq
                    .take()
                    .unwrap_or_else(|| self.a.last_in_order());
                ctx.to_physical_layer(Frame::ack(ack_seq, Packet::new("ACK:A"), Direction::AtoB));
                self.ack_owner = None;
            }
            Some(Direction::BtoA) => {
                let ack_seq = self
                    .b
                    .ack_pending_seq
                    .take()
                    .unwrap_or_else(|| self.b.last_in_order());
                ctx.to_physical_layer(Frame::ack(ack_seq, Packet::new("ACK:B"), Direction::BtoA));
                self.ack_owner = None;
            }
            None => {}
        }
        self.rearm(ctx);
    }

    fn on_timeout(&mut self, ctx: &mut dyn EventApi, seq_key: u32) {
        self.guard.advance();
        if seq_key >= TX_OFFSET_B {
            self.b.tx_timeout(ctx, seq_key - TX_OFFSET_B, &mut self.guard);
        } else {
            self.a.tx_timeout(ctx, seq_key, &mut self.guard);
        }
        self.rearm(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protosim_core::SimConfig;
    use protosim_engine::run_for_steps;

    #[test]
    fn both_directions_make_progress_with_a_perfect_channel() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 1.0,
            ack_timeout: 0.05,
            ..SimConfig::default()
        };
        let snap = run_for_steps(config, Box::new(SlidingWindow1Bit::new(1)), 200).unwrap();
        assert!(snap.messages_delivered >= 4);
    }

    #[test]
    fn survives_loss_and_corruption_via_timers() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 0.05,
            ack_timeout: 0.02,
            loss_prob: 0.2,
            corrupt_prob: 0.1,
            seed: 99,
            ..SimConfig::default()
        };
        let snap = run_for_steps(config, Box::new(SlidingWindow1Bit::new(99)), 2000).unwrap();
        assert!(snap.messages_delivered >= 3);
    }

    /// Wraps [`SlidingWindow1Bit`] and checks, after every dispatched
    /// callback, that each direction never has more than one outstanding
    /// (unacknowledged) `DATA` frame — scenario F's `nbuffered in {0, 1}`.
    struct NBufferedChecked(SlidingWindow1Bit);

    impl NBufferedChecked {
        fn check(&self) {
            assert!(
                self.0.a.out_buf.len() <= 1,
                "peer A has more than one outstanding frame: {:?}",
                self.0.a.out_buf.keys().collect::<Vec<_>>()
            );
            assert!(
                self.0.b.out_buf.len() <= 1,
                "peer B has more than one outstanding frame: {:?}",
                self.0.b.out_buf.keys().collect::<Vec<_>>()
            );
        }
    }

    impl Protocol for NBufferedChecked {
        fn init(&mut self, ctx: &mut dyn EventApi) {
            self.0.init(ctx);
            self.check();
        }
        fn on_network_layer_ready(&mut self, ctx: &mut dyn EventApi) {
            self.0.on_network_layer_ready(ctx);
            self.check();
        }
        fn on_frame_arrival(&mut self, ctx: &mut dyn EventApi, frame: Frame) {
            self.0.on_frame_arrival(ctx, frame);
            self.check();
        }
        fn on_checksum_error(&mut self, ctx: &mut dyn EventApi) {
            self.0.on_checksum_error(ctx);
            self.check();
        }
        fn on_timeout(&mut self, ctx: &mut dyn EventApi, seq_key: u32) {
            self.0.on_timeout(ctx, seq_key);
            self.check();
        }
        fn on_ack_timeout(&mut self, ctx: &mut dyn EventApi) {
            self.0.on_ack_timeout(ctx);
            self.check();
        }
    }

    #[test]
    fn nbuffered_never_exceeds_one_per_direction_under_light_loss() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 0.1,
            ack_timeout: 0.04,
            loss_prob: 0.1,
            seed: 123,
            ..SimConfig::default()
        };
        let snap = run_for_steps(
            config,
            Box::new(NBufferedChecked(SlidingWindow1Bit::new(123))),
            1000,
        )
        .unwrap();
        assert!(snap.messages_delivered >= 5);
    }
}

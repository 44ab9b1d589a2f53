use std::collections::HashMap;

use protosim_core::{Direction, EventApi, Frame, FrameKind, Packet, Protocol};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::common::{EpochGuard, TX_OFFSET_B, between, inc, tx_offset};

/// One endpoint's Go-Back-N send/receive state: an `N`-frame send
/// window with a single cumulative retransmission timer for the
/// window base, and a strictly-in-order receiver that silently drops
/// anything out of sequence. Ported from `Go_back_n.py`'s `GBNPeer`.
#[derive(Debug)]
struct Peer {
    own_direction: Direction,
    max_seq: u32,
    window: u32,
    ack_expected: u32,
    next_to_send: u32,
    nbuffered: u32,
    out_buf: HashMap<u32, Packet>,
    frame_expected: u32,
}

impl Peer {
    fn new(own_direction: Direction, max_seq: u32) -> Self {
        Self {
            own_direction,
            max_seq,
            window: max_seq,
            ack_expected: 0,
            next_to_send: 0,
            nbuffered: 0,
            out_buf: HashMap::new(),
            frame_expected: 0,
        }
    }

    fn has_space(&self) -> bool {
        self.nbuffered < self.window
    }

    fn last_in_order(&self) -> u32 {
        (self.frame_expected + self.max_seq) % (self.max_seq + 1)
    }

    fn timer_key(&self, seq: u32) -> u32 {
        tx_offset(self.own_direction) + seq
    }

    fn tx_push_new(&mut self, ctx: &mut dyn EventApi, guard: &mut EpochGuard) {
        let packet = ctx.from_network_layer();
        let packet = Packet::new(format!("{}>{}", self.own_direction.tag(), packet.data));
        let seq = self.next_to_send;
        self.out_buf.insert(seq, packet);
        self.nbuffered += 1;
        self.send_data(ctx, seq, guard);
        self.next_to_send = inc(seq, self.max_seq);
    }

    fn send_data(&mut self, ctx: &mut dyn EventApi, seq: u32, guard: &mut EpochGuard) {
        let key = self.timer_key(seq);
        if guard.should_skip(key) {
            return;
        }
        let ack_pb = self.last_in_order();
        let packet = self
            .out_buf
            .get(&seq)
            .cloned()
            .expect("buffered packet missing");
        ctx.to_physical_layer(Frame::data(seq, ack_pb, packet, self.own_direction));
        guard.mark_sent(key);
        if seq == self.ack_expected {
            ctx.start_timer(key);
        }
    }

    fn tx_consume_ack(&mut self, ctx: &mut dyn EventApi, ack: u32) {
        let mut advanced = false;
        while self.nbuffered > 0 && between(self.ack_expected, ack, self.next_to_send) {
            let old_base = self.ack_expected;
            ctx.stop_timer(self.timer_key(old_base));
            self.out_buf.remove(&old_base);
            self.nbuffered -= 1;
            self.ack_expected = inc(self.ack_expected, self.max_seq);
            advanced = true;
        }
        if advanced && self.nbuffered > 0 {
            ctx.start_timer(self.timer_key(self.ack_expected));
        }
    }

    fn tx_timeout(&mut self, ctx: &mut dyn EventApi, guard: &mut EpochGuard) {
        if self.nbuffered == 0 {
            return;
        }
        let mut seq = self.ack_expected;
        for _ in 0..self.nbuffered {
            self.send_data(ctx, seq, guard);
            seq = inc(seq, self.max_seq);
        }
    }

    fn rx_handle_data(&mut self, ctx: &mut dyn EventApi, r_seq: u32, info: Packet) {
        if r_seq == self.frame_expected {
            ctx.to_network_layer(info);
            self.frame_expected = inc(self.frame_expected, self.max_seq);
        }
    }
}

/// Go-Back-N: an `N`-frame pipelined send window per direction,
/// cumulative acknowledgement, and retransmit-the-whole-window on
/// timeout. Ported from `Go_back_n.py`'s `run_gbn_bidirectional`.
pub struct GoBackN {
    a: Peer,
    b: Peer,
    ack_owner: Option<Direction>,
    guard: EpochGuard,
    rng: StdRng,
    burst_k: u32,
}

impl GoBackN {
    pub fn new(max_seq: u32, seed: u64) -> Self {
        Self::with_burst(max_seq, max_seq, seed)
    }

    pub fn with_burst(max_seq: u32, burst_k: u32, seed: u64) -> Self {
        Self {
            a: Peer::new(Direction::AtoB, max_seq),
            b: Peer::new(Direction::BtoA, max_seq),
            ack_owner: None,
            guard: EpochGuard::default(),
            rng: StdRng::seed_from_u64(seed),
            burst_k,
        }
    }

    fn burst_send(
        peer: &mut Peer,
        guard: &mut EpochGuard,
        ack_owner: &mut Option<Direction>,
        ctx: &mut dyn EventApi,
        burst_k: u32,
    ) -> u32 {
        let free = peer.window.saturating_sub(peer.nbuffered);
        if free == 0 {
            return 0;
        }
        let budget = burst_k.min(free);
        for _ in 0..budget {
            peer.tx_push_new(ctx, guard);
            if *ack_owner == Some(peer.own_direction) {
                ctx.stop_ack_timer();
                *ack_owner = None;
            }
        }
        budget
    }

    fn rearm(&self, ctx: &mut dyn EventApi) {
        if self.a.has_space() || self.b.has_space() {
            ctx.enable_network_layer();
        } else {
            ctx.disable_network_layer();
        }
    }
}

impl Protocol for GoBackN {
    fn init(&mut self, ctx: &mut dyn EventApi) {
        ctx.enable_network_layer();
    }

    fn on_network_layer_ready(&mut self, ctx: &mut dyn EventApi) {
        self.guard.advance();
        let winner_is_a = self.rng.random_bool(0.5);

        let mut sent_total = 0;
        if winner_is_a {
            if self.a.has_space() {
                sent_total +=
                    Self::burst_send(&mut self.a, &mut self.guard, &mut self.ack_owner, ctx, self.burst_k);
            }
        } else if self.b.has_space() {
            sent_total +=
                Self::burst_send(&mut self.b, &mut self.guard, &mut self.ack_owner, ctx, self.burst_k);
        }

        if sent_total == 0 {
            if !self.a.has_space() && !self.b.has_space() {
                ctx.disable_network_layer();
            } else {
                ctx.enable_network_layer();
            }
        } else {
            ctx.enable_network_layer();
        }
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
                if self.a.has_space() || self.b.has_space() {
                    ctx.enable_network_layer();
                }
            }
            FrameKind::Ack => {
                if frame.direction == Direction::AtoB {
                    self.b.tx_consume_ack(ctx, frame.ack);
                } else {
                    self.a.tx_consume_ack(ctx, frame.ack);
                }
                if self.a.has_space() || self.b.has_space() {
                    ctx.enable_network_layer();
                }
            }
            FrameKind::Nak => {}
        }
    }

    fn on_ack_timeout(&mut self, ctx: &mut dyn EventApi) {
        match self.ack_owner {
            Some(Direction::AtoB) => {
                let ack = self.a.last_in_order();
                ctx.to_physical_layer(Frame::ack(ack, Packet::new("ACK:A"), Direction::AtoB));
                self.ack_owner = None;
            }
            Some(Direction::BtoA) => {
                let ack = self.b.last_in_order();
                ctx.to_physical_layer(Frame::ack(ack, Packet::new("ACK:B"), Direction::BtoA));
                self.ack_owner = None;
            }
            None => {}
        }
        self.rearm(ctx);
    }

    fn on_timeout(&mut self, ctx: &mut dyn EventApi, seq_key: u32) {
        self.guard.advance();
        if seq_key >= TX_OFFSET_B {
            self.b.tx_timeout(ctx, &mut self.guard);
            if self.ack_owner == Some(Direction::BtoA) {
                ctx.stop_ack_timer();
                self.ack_owner = None;
            }
        } else {
            self.a.tx_timeout(ctx, &mut self.guard);
            if self.ack_owner == Some(Direction::AtoB) {
                ctx.stop_ack_timer();
                self.ack_owner = None;
            }
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
    fn pipelines_a_full_window_with_a_perfect_channel() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 1.0,
            ack_timeout: 0.2,
            max_seq: 7,
            ..SimConfig::default()
        };
        let snap = run_for_steps(config, Box::new(GoBackN::new(7, 11)), 300).unwrap();
        assert!(snap.messages_delivered >= 10);
    }

    #[test]
    fn cumulative_ack_recovers_from_loss() {
        let config = SimConfig {
            mean_delay: 0.01,
            data_timeout: 0.05,
            ack_timeout: 0.02,
            loss_prob: 0.15,
            max_seq: 7,
            seed: 5,
            ..SimConfig::default()
        };
        let snap = run_for_steps(config, Box::new(GoBackN::new(7, 5)), 3000).unwrap();
        assert!(snap.messages_delivered >= 10);
    }
}

use std::collections::HashMap;

use protosim_core::Direction;

/// Timer-key offset separating the two logical flows of a bidirectional
/// protocol so a single `EventApi::start_timer`/`stop_timer` keyspace
/// can hold both directions' per-sequence timers at once. Mirrors
/// `OFFSET_A`/`OFFSET_B` in the original `Go_back_n.py`/
/// `selectiveRepeat.py`/`slidingWindow.py`.
pub const TX_OFFSET_A: u32 = 0;
pub const TX_OFFSET_B: u32 = 100;

pub fn tx_offset(direction: Direction) -> u32 {
    match direction {
        Direction::AtoB => TX_OFFSET_A,
        Direction::BtoA => TX_OFFSET_B,
    }
}

/// Next sequence number after `seq`, wrapping modulo `max_seq + 1`.
pub fn inc(seq: u32, max_seq: u32) -> u32 {
    (seq + 1) % (max_seq + 1)
}

/// True if `b` lies in the circular half-open range `[a, c)` modulo the
/// sequence space implied by `a`/`c`. Standard sliding-window interval
/// test, ported as-is from the Tanenbaum-style `between()` every
/// reference protocol here relies on.
pub fn between(a: u32, b: u32, c: u32) -> bool {
    if a <= c {
        a <= b && b < c
    } else {
        a <= b || b < c
    }
}

/// Guards against sending the same timer-keyed frame twice from within
/// a single event dispatch (e.g. a Go-Back-N retransmit-all-from-base
/// sweep touching a sequence number that a burst-send already emitted
/// for this event). Each `Protocol` callback that can send more than
/// one frame calls `advance()` once at entry, then `mark_sent`/
/// `should_skip` around each individual send — grounded on the
/// `_last_sent_epoch`/`epoch` bookkeeping in `Go_back_n.py` and
/// `selectiveRepeat.py`.
#[derive(Debug, Default)]
pub struct EpochGuard {
    step: u64,
    last_sent: HashMap<u32, u64>,
}

impl EpochGuard {
    pub fn advance(&mut self) {
        self.step += 1;
    }

    pub fn should_skip(&self, key: u32) -> bool {
        self.last_sent.get(&key) == Some(&self.step)
    }

    pub fn mark_sent(&mut self, key: u32) {
        self.last_sent.insert(key, self.step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_wraps_at_max_seq() {
        assert_eq!(inc(7, 7), 0);
        assert_eq!(inc(0, 7), 1);
        assert_eq!(inc(1, 1), 0);
    }

    #[test]
    fn between_handles_non_wrapping_range() {
        assert!(between(2, 3, 6));
        assert!(!between(2, 6, 6));
        assert!(!between(2, 1, 6));
    }

    #[test]
    fn between_handles_wrapping_range() {
        assert!(between(6, 7, 2));
        assert!(between(6, 0, 2));
        assert!(!between(6, 3, 2));
    }

    #[test]
    fn epoch_guard_skips_only_within_same_step() {
        let mut guard = EpochGuard::default();
        guard.advance();
        guard.mark_sent(5);
        assert!(guard.should_skip(5));
        assert!(!guard.should_skip(6));
        guard.advance();
        assert!(!guard.should_skip(5));
    }

    #[test]
    fn tx_offset_separates_directions() {
        assert_eq!(tx_offset(Direction::AtoB), TX_OFFSET_A);
        assert_eq!(tx_offset(Direction::BtoA), TX_OFFSET_B);
        assert_ne!(tx_offset(Direction::AtoB), tx_offset(Direction::BtoA));
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can arise from a `SimConfig` that doesn't describe a
/// coherent protocol run. All of these are construction-time failures
/// (spec §7): nothing about a *running* simulation ever raises.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_seq must be of the form 2^k - 1 (1, 3, 7, 15, ...), got {0}")]
    InvalidMaxSeq(u32),

    #[error("nr_bufs ({nr_bufs}) exceeds (max_seq+1)/2 ({limit}) for max_seq={max_seq}")]
    NrBufsTooLarge {
        nr_bufs: u32,
        max_seq: u32,
        limit: u32,
    },

    #[error("loss_prob must be in [0, 1], got {0}")]
    LossOutOfRange(f64),

    #[error("corrupt_prob must be in [0, 1], got {0}")]
    CorruptOutOfRange(f64),
}

/// Immutable configuration for one simulation run.
///
/// Field names follow spec §3 ("SimConfig") rather than the teacher's
/// TCP-header-shaped config, since the protocol family here cares about
/// link delay/jitter/loss/corruption and per-seq timers, not TCP ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Mean one-way link delay.
    pub mean_delay: f64,
    /// Half-width of the uniform jitter applied around `mean_delay`.
    pub jitter: f64,
    /// Probability in [0,1] that an emitted frame is dropped in transit.
    pub loss_prob: f64,
    /// Probability in [0,1] that a non-dropped frame arrives corrupted
    /// (delivered as a `ChecksumError` event rather than `FrameArrival`).
    pub corrupt_prob: f64,
    /// Per-sequence-number data retransmission timeout.
    pub data_timeout: f64,
    /// Deferred/piggyback ack timeout.
    pub ack_timeout: f64,
    /// Size of the sequence-number space minus one (1, 3, 7, 15, ...).
    pub max_seq: u32,
    /// Receiver buffer count for Selective Repeat.
    pub nr_bufs: u32,
    /// Whether `enable_network_layer` should also schedule an
    /// immediate-ish `NetworkLayerReady` ("ACK-wake" policy).
    pub ready_on_enable: bool,
    /// Delay used by the ACK-wake policy above.
    pub ready_delay: f64,
    /// Seed for the channel's PRNG; same seed -> same run.
    pub seed: u64,
}

impl SimConfig {
    /// A config for `max_seq`, deriving `nr_bufs` the usual way.
    pub fn with_max_seq(max_seq: u32) -> Self {
        Self {
            max_seq,
            nr_bufs: (max_seq + 1) / 2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_seq + 1).is_power_of_two() {
            return Err(ConfigError::InvalidMaxSeq(self.max_seq));
        }
        let limit = (self.max_seq + 1) / 2;
        if self.nr_bufs > limit {
            return Err(ConfigError::NrBufsTooLarge {
                nr_bufs: self.nr_bufs,
                max_seq: self.max_seq,
                limit,
            });
        }
        if !(0.0..=1.0).contains(&self.loss_prob) {
            return Err(ConfigError::LossOutOfRange(self.loss_prob));
        }
        if !(0.0..=1.0).contains(&self.corrupt_prob) {
            return Err(ConfigError::CorruptOutOfRange(self.corrupt_prob));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mean_delay: 0.0,
            jitter: 0.0,
            loss_prob: 0.0,
            corrupt_prob: 0.0,
            data_timeout: 0.5,
            ack_timeout: 0.15,
            max_seq: 7,
            nr_bufs: 4,
            ready_on_enable: false,
            ready_delay: 0.005,
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_max_seq() {
        let cfg = SimConfig::with_max_seq(6);
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidMaxSeq(6)));
    }

    #[test]
    fn rejects_oversized_nr_bufs() {
        let mut cfg = SimConfig::with_max_seq(7);
        cfg.nr_bufs = 5;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NrBufsTooLarge {
                nr_bufs: 5,
                max_seq: 7,
                limit: 4,
            })
        );
    }

    #[test]
    fn rejects_out_of_range_probabilities() {
        let mut cfg = SimConfig::default();
        cfg.loss_prob = 1.5;
        assert_eq!(cfg.validate(), Err(ConfigError::LossOutOfRange(1.5)));

        let mut cfg = SimConfig::default();
        cfg.corrupt_prob = -0.1;
        assert_eq!(cfg.validate(), Err(ConfigError::CorruptOutOfRange(-0.1)));
    }
}

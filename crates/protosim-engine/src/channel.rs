use protosim_core::SimConfig;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Stateless-given-a-PRNG sampling of per-frame delay/loss/corruption
/// (spec §4.1). Owns a seeded `StdRng` so a run is fully reproducible
/// from `SimConfig::seed`, matching the teacher's
/// `StdRng::seed_from_u64(config.seed)` in `engine.rs`.
pub struct ChannelPolicy {
    mean_delay: f64,
    jitter: f64,
    loss_prob: f64,
    corrupt_prob: f64,
    rng: StdRng,
}

impl ChannelPolicy {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            mean_delay: config.mean_delay,
            jitter: config.jitter,
            loss_prob: config.loss_prob,
            corrupt_prob: config.corrupt_prob,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Non-negative delay sample for one frame in flight.
    pub fn sample_delay(&mut self) -> f64 {
        if self.jitter == 0.0 {
            return self.mean_delay;
        }
        let low = (self.mean_delay - self.jitter).max(0.0);
        let high = self.mean_delay + self.jitter;
        self.rng.random_range(low..=high)
    }

    pub fn will_drop(&mut self) -> bool {
        self.rng.random::<f64>() < self.loss_prob
    }

    pub fn will_corrupt(&mut self) -> bool {
        self.rng.random::<f64>() < self.corrupt_prob
    }
}

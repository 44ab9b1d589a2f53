use protosim_core::{ConfigError, Protocol, SimConfig};

use crate::engine::Simulator;
use crate::snapshot::Snapshot;

/// Validate `config`, run `protocol` through the event kernel for up
/// to `steps` dispatched events (fewer if the run goes idle first:
/// spec §4.2/§7), and return a snapshot of what happened.
///
/// Grounded on `tcp-lab-sim-cli/src/main.rs`'s construct-validate-run
/// sequence, minus the CLI argument parsing and TUI rendering that
/// surround it there.
pub fn run_for_steps(
    config: SimConfig,
    protocol: Box<dyn Protocol>,
    steps: usize,
) -> Result<Snapshot, ConfigError> {
    config.validate()?;
    let mut sim = Simulator::new(config, protocol);
    sim.run(steps);
    Ok(Snapshot::capture(&sim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use protosim_core::{ConfigError, EventApi};

    struct NoOp;
    impl Protocol for NoOp {}

    #[test]
    fn rejects_invalid_config_before_running_anything() {
        let config = SimConfig::with_max_seq(6);
        let err = run_for_steps(config, Box::new(NoOp), 10).unwrap_err();
        assert_eq!(err, ConfigError::InvalidMaxSeq(6));
    }

    #[test]
    fn idle_network_disabled_run_yields_empty_logs() {
        let snap = run_for_steps(SimConfig::default(), Box::new(NoOp), 100).unwrap();
        assert_eq!(snap.events_dispatched, 0);
        assert_eq!(snap.frames_sent, 0);
    }

    struct EnableOnly;
    impl Protocol for EnableOnly {
        fn init(&mut self, ctx: &mut dyn EventApi) {
            ctx.enable_network_layer();
        }
    }

    #[test]
    fn step_budget_caps_dispatched_events() {
        let snap = run_for_steps(SimConfig::default(), Box::new(EnableOnly), 3).unwrap();
        assert_eq!(snap.events_dispatched, 3);
    }
}

pub mod channel;
pub mod driver;
pub mod engine;
pub mod snapshot;

pub use channel::ChannelPolicy;
pub use driver::run_for_steps;
pub use engine::Simulator;
pub use snapshot::Snapshot;

pub mod api;
pub mod config;
pub mod event;
pub mod frame;
pub mod packet;

pub use api::{EventApi, Protocol};
pub use config::{ConfigError, SimConfig};
pub use event::{Event, TimerToken};
pub use frame::{Direction, Frame, FrameKind};
pub use packet::Packet;

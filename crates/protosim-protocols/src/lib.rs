pub mod common;
pub mod go_back_n;
pub mod par;
pub mod selective_repeat;
pub mod sliding1;
pub mod stop_and_wait;
pub mod utopia;

pub use go_back_n::GoBackN;
pub use par::Par;
pub use selective_repeat::SelectiveRepeat;
pub use sliding1::SlidingWindow1Bit;
pub use stop_and_wait::StopAndWait;
pub use utopia::Utopia;

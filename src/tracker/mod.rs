pub mod phase;
pub mod smooth;

pub use phase::{PhaseTracker, PhaseUpdate};
pub use smooth::MovingAverage;

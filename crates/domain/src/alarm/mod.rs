mod entity;
mod state;

pub use entity::{Alarm, AlarmTransition, AlarmView};
pub use state::AlarmState;

/// Classification used when none is configured
pub const DEFAULT_CLASSIFICATION: &str = "process";

pub mod engine;

pub use engine::{AlarmEngine, EngineSummary};

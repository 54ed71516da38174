pub mod engine;
pub mod rule;

pub use engine::ControlEngine;
pub use rule::{Control, Rule, RuleAction};

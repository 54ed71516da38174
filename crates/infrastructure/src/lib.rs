//! Infrastructure layer - Configuration and storage adapters

pub mod archive;
pub mod config;
pub mod history;

pub use archive::InMemoryEventArchive;
pub use config::{DrainPolicy, RuntimeConfig, SchedulerConfig};
pub use history::InMemoryTagHistory;

//! Domain layer - Pure process-control types with no runtime dependencies
//!
//! This crate contains:
//! - Tag names, declared types and change events
//! - Conditions shared by alarms and controls
//! - The alarm entity and its state machine
//! - Event/alarm records and the archival port
//! - The history port and worker status types

pub mod alarm;
pub mod condition;
pub mod error;
pub mod event;
pub mod history;
pub mod tag;
pub mod worker;

// Re-export commonly used types
pub use alarm::{Alarm, AlarmState, AlarmView};
pub use condition::{Condition, Operator, Threshold};
pub use error::{BoxError, DomainError};
pub use event::{AlarmRecord, AlarmSummary, EventArchive, EventRecord};
pub use history::{Sample, TagHistory};
pub use tag::{TagChange, TagName, TagType};
pub use worker::{WorkerInfo, WorkerStatus};

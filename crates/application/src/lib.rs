//! Application layer - Tag store, engines and workers
//!
//! - `tag`: the current-value table and its notification queues
//! - `alarm` / `control`: engines driven by tag changes
//! - `machine`: state machines ticked on a fixed period
//! - `worker`: reactive, continuous and periodic workers plus the scheduler
//! - `app`: the facade wiring all of the above

pub mod alarm;
pub mod app;
pub mod control;
pub mod machine;
pub mod tag;
pub mod worker;

pub use alarm::{AlarmEngine, EngineSummary};
pub use app::{AppSummary, Application, WriteResult};
pub use control::{Control, ControlEngine, Rule};
pub use machine::{MachineState, MachineView, StateMachine, StateMachineDriver};
pub use tag::TagStore;
pub use worker::{ContinuousWorker, Job, Scheduler, WorkerHandle, from_fn};

pub mod continuous;
pub(crate) mod fault;
pub mod job;
pub mod logger;
pub mod periodic;
pub mod reactive;
pub mod scheduler;

pub use continuous::{CycleOutcome, ContinuousWorker, ContinuousWorkerBuilder, WorkerHandle};
pub use job::{FnJob, Job, from_fn};
pub use logger::{LOGGER_WORKER, TagLogger};
pub use periodic::PeriodicWorker;
pub use reactive::{ReactiveEngine, ReactiveWorker};
pub use scheduler::Scheduler;

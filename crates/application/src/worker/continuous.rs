use domain::error::{DomainError, Result};
use domain::tag::is_truthy;
use domain::{TagName, WorkerInfo, WorkerStatus};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fault::panic_message;
use super::job::Job;
use crate::tag::TagStore;

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(500);

/// What one cycle of a continuous worker did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Stop tag was set; the worker is terminated
    Stopped,
    Paused,
    Completed,
    /// Payload returned an error or panicked
    Failed,
}

struct Shared {
    name: Option<String>,
    period: Duration,
    pause_tag: Option<TagName>,
    stop_tag: Option<TagName>,
    status: watch::Sender<WorkerStatus>,
    terminated: AtomicBool,
    job: RwLock<Arc<dyn Job>>,
    tags: Arc<TagStore>,
}

impl Shared {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// Subscribers are only woken when the status actually changes.
    fn set_status(&self, status: WorkerStatus) {
        let mut previous = status;
        let changed = self.status.send_if_modified(|current| {
            previous = std::mem::replace(current, status);
            previous != status
        });
        if changed {
            debug!(worker = %self.label(), from = %previous, to = %status, "Worker status changed");
        }
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.set_status(WorkerStatus::Stop);
    }

    /// Unreadable control tags count as false.
    fn flag(&self, tag: &Option<TagName>) -> bool {
        let Some(tag) = tag else {
            return false;
        };
        match self.tags.read(tag.as_str()) {
            Ok(value) => is_truthy(&value),
            Err(e) => {
                warn!(worker = %self.label(), tag = %tag, error = %e, "Failed to read worker control tag");
                false
            }
        }
    }
}

/// Periodic payload with drift compensation and tag-driven pause/stop.
pub struct ContinuousWorker {
    shared: Arc<Shared>,
}

impl ContinuousWorker {
    pub fn builder<J: Job + 'static>(job: J) -> ContinuousWorkerBuilder {
        ContinuousWorkerBuilder::new(Arc::new(job))
    }

    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            shared: self.shared.clone(),
        }
    }

    /// Runs one cycle: stop check, pause check, then the payload.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let shared = &self.shared;

        if shared.flag(&shared.stop_tag) {
            shared.terminate();
            return CycleOutcome::Stopped;
        }

        if shared.flag(&shared.pause_tag) {
            shared.set_status(WorkerStatus::Pause);
            return CycleOutcome::Paused;
        }

        let job = shared
            .job
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match AssertUnwindSafe(job.run(&shared.tags)).catch_unwind().await {
            Ok(Ok(())) => {
                shared.set_status(WorkerStatus::Running);
                CycleOutcome::Completed
            }
            Ok(Err(e)) => {
                error!(worker = %shared.label(), error = %e, "Worker payload failed");
                shared.set_status(WorkerStatus::Error);
                CycleOutcome::Failed
            }
            Err(panic) => {
                error!(worker = %shared.label(), error = %panic_message(&*panic), "Worker payload panicked");
                shared.set_status(WorkerStatus::Error);
                CycleOutcome::Failed
            }
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let period = self.shared.period;
        let label = self.shared.label().to_string();
        info!(worker = %label, period_ms = period.as_millis() as u64, "Continuous worker started");

        tokio::select! {
            _ = cancel.cancelled() => {
                self.shared.terminate();
                info!(worker = %label, "Continuous worker cancelled");
                return;
            }
            _ = tokio::time::sleep(period) => {}
        }

        loop {
            let started = Instant::now();

            if self.run_cycle().await == CycleOutcome::Stopped {
                info!(worker = %label, "Continuous worker stopped by tag");
                return;
            }

            let elapsed = started.elapsed();
            match period.checked_sub(elapsed) {
                Some(remaining) if !remaining.is_zero() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(remaining) => {}
                    }
                }
                _ => {
                    warn!(
                        worker = %label,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Unable to perform on time"
                    );
                    if cancel.is_cancelled() {
                        break;
                    }
                }
            }
        }

        self.shared.terminate();
        info!(worker = %label, "Continuous worker cancelled");
    }
}

pub struct ContinuousWorkerBuilder {
    job: Arc<dyn Job>,
    name: Option<String>,
    period: Duration,
    pause_tag: Option<String>,
    stop_tag: Option<String>,
}

impl ContinuousWorkerBuilder {
    fn new(job: Arc<dyn Job>) -> Self {
        Self {
            job,
            name: None,
            period: DEFAULT_PERIOD,
            pause_tag: None,
            stop_tag: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn pause_tag(mut self, tag: impl Into<String>) -> Self {
        self.pause_tag = Some(tag.into());
        self
    }

    pub fn stop_tag(mut self, tag: impl Into<String>) -> Self {
        self.stop_tag = Some(tag.into());
        self
    }

    /// Fails when the period is zero or a control tag is not defined.
    pub fn build(self, tags: Arc<TagStore>) -> Result<(ContinuousWorker, WorkerHandle)> {
        if self.period.is_zero() {
            return Err(DomainError::InvalidConfiguration(format!(
                "worker {} has a zero period",
                self.name.as_deref().unwrap_or("unnamed")
            )));
        }

        let pause_tag = resolve(&tags, self.pause_tag)?;
        let stop_tag = resolve(&tags, self.stop_tag)?;
        let (status, _) = watch::channel(WorkerStatus::Stop);

        let worker = ContinuousWorker {
            shared: Arc::new(Shared {
                name: self.name,
                period: self.period,
                pause_tag,
                stop_tag,
                status,
                terminated: AtomicBool::new(false),
                job: RwLock::new(self.job),
                tags,
            }),
        };
        let handle = worker.handle();
        Ok((worker, handle))
    }
}

fn resolve(tags: &TagStore, tag: Option<String>) -> Result<Option<TagName>> {
    let Some(tag) = tag else {
        return Ok(None);
    };
    let name = TagName::new(tag)?;
    if !tags.contains(name.as_str()) {
        return Err(DomainError::TagNotFound(name.to_string()));
    }
    Ok(Some(name))
}

/// Control surface of a registered continuous worker.
#[derive(Clone)]
pub struct WorkerHandle {
    shared: Arc<Shared>,
}

impl WorkerHandle {
    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    /// Sets the pause tag. `Ok(false)` when there is no pause tag or the
    /// worker has terminated.
    pub fn pause(&self) -> Result<bool> {
        self.write_flag(&self.shared.pause_tag, true)
    }

    pub fn resume(&self) -> Result<bool> {
        self.write_flag(&self.shared.pause_tag, false)
    }

    /// Sets the stop tag; the worker terminates on its next cycle.
    pub fn stop(&self) -> Result<bool> {
        self.write_flag(&self.shared.stop_tag, true)
    }

    pub fn status(&self) -> WorkerStatus {
        *self.shared.status.borrow()
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::SeqCst)
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.shared.status.subscribe()
    }

    pub fn info(&self) -> WorkerInfo {
        WorkerInfo {
            name: self.shared.name.clone(),
            period: self.shared.period.as_secs_f64(),
            pause_tag: self.shared.pause_tag.as_ref().map(TagName::to_string),
            stop_tag: self.shared.stop_tag.as_ref().map(TagName::to_string),
            status: self.status(),
        }
    }

    /// Swaps the payload; takes effect on the next cycle.
    pub fn replace_job<J: Job + 'static>(&self, job: J) {
        *self
            .shared
            .job
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(job);
        info!(worker = %self.shared.label(), "Worker payload replaced");
    }

    fn write_flag(&self, tag: &Option<TagName>, value: bool) -> Result<bool> {
        if self.is_terminated() {
            return Ok(false);
        }
        let Some(tag) = tag else {
            return Ok(false);
        };
        self.shared.tags.write(tag.as_str(), Value::Bool(value))?;
        Ok(true)
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("info", &self.info())
            .finish()
    }
}

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::fault::panic_message;
use super::job::Job;
use crate::tag::TagStore;

/// Fixed-delay worker: sleep one period, run the payload, repeat.
/// No drift compensation and no pause/stop tags.
pub struct PeriodicWorker {
    name: String,
    period: Duration,
    job: Arc<dyn Job>,
    tags: Arc<TagStore>,
}

impl PeriodicWorker {
    pub fn new<J: Job + 'static>(
        name: impl Into<String>,
        period: Duration,
        job: J,
        tags: Arc<TagStore>,
    ) -> Self {
        Self {
            name: name.into(),
            period,
            job: Arc::new(job),
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(worker = %self.name, period_ms = self.period.as_millis() as u64, "Periodic worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
            match AssertUnwindSafe(self.job.run(&self.tags)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(worker = %self.name, error = %e, "Periodic payload failed"),
                Err(panic) => {
                    error!(worker = %self.name, error = %panic_message(&*panic), "Periodic payload panicked")
                }
            }
        }
        info!(worker = %self.name, "Periodic worker stopped");
    }
}

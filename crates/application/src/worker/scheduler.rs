use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::continuous::ContinuousWorker;
use super::periodic::PeriodicWorker;
use super::reactive::ReactiveWorker;
use crate::machine::StateMachineDriver;

/// Owns every running unit and the token that cancels them all.
#[derive(Debug)]
pub struct Scheduler {
    cancel: CancellationToken,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns a unit on the runtime. It receives a child of the shared token.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, unit: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(unit(self.cancel.child_token()));
        info!(unit = %name, "Worker spawned");
        self.tasks.push((name, handle));
    }

    pub fn spawn_reactive(&mut self, name: impl Into<String>, worker: ReactiveWorker) {
        self.spawn(name, move |cancel| worker.run(cancel));
    }

    pub fn spawn_continuous(&mut self, name: impl Into<String>, worker: ContinuousWorker) {
        self.spawn(name, move |cancel| worker.run(cancel));
    }

    pub fn spawn_periodic(&mut self, worker: PeriodicWorker) {
        let name = worker.name().to_string();
        self.spawn(name, move |cancel| worker.run(cancel));
    }

    pub fn spawn_machines(&mut self, driver: Arc<StateMachineDriver>, period: Duration) {
        self.spawn("machines", move |cancel| driver.run(period, cancel));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Names of units whose task has already returned.
    pub fn finished(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Cancels every unit and waits for all of them to return.
    pub async fn shutdown(self) {
        info!(units = self.tasks.len(), "Shutting down workers");
        self.cancel.cancel();
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                error!(unit = %name, error = %e, "Worker task failed");
            }
        }
        info!("All workers stopped");
    }
}

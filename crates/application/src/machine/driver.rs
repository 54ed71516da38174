use domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::state_machine::{MachineError, ManagedMachine};
use crate::tag::TagStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineView {
    pub name: String,
    pub state: String,
}

/// Owns the registered state machines and ticks them in order.
pub struct StateMachineDriver {
    machines: Mutex<Vec<Box<dyn ManagedMachine>>>,
    tags: Arc<TagStore>,
}

impl StateMachineDriver {
    pub fn new(tags: Arc<TagStore>) -> Self {
        Self {
            machines: Mutex::new(Vec::new()),
            tags,
        }
    }

    pub async fn append<M: ManagedMachine + 'static>(&self, machine: M) -> Result<()> {
        let mut machines = self.machines.lock().await;
        if machines.iter().any(|m| m.name() == machine.name()) {
            return Err(DomainError::InvalidConfiguration(format!(
                "duplicate state machine {}",
                machine.name()
            )));
        }
        info!(machine = %machine.name(), state = machine.state_name(), "State machine loaded");
        machines.push(Box::new(machine));
        Ok(())
    }

    pub async fn is_empty(&self) -> bool {
        self.machines.lock().await.is_empty()
    }

    pub async fn machines(&self) -> Vec<MachineView> {
        self.machines
            .lock()
            .await
            .iter()
            .map(|m| MachineView {
                name: m.name().to_string(),
                state: m.state_name().to_string(),
            })
            .collect()
    }

    /// Runs the current-state handler of every machine once. Failures are
    /// logged and never stop the remaining machines.
    pub async fn tick(&self) {
        let mut machines = self.machines.lock().await;
        for machine in machines.iter_mut() {
            let state = machine.state_name();
            match catch_unwind(AssertUnwindSafe(|| machine.tick(&self.tags))) {
                Ok(Ok(())) => {}
                Ok(Err(MachineError::MissingHandler { state })) => {
                    warn!(machine = %machine.name(), state, "Machine has no handler for state");
                }
                Ok(Err(e)) => {
                    error!(machine = %machine.name(), state, error = %e, "Machine handler failed");
                }
                Err(_) => {
                    error!(machine = %machine.name(), state, "Machine handler panicked");
                }
            }
        }
    }

    /// Ticks every `period` until cancelled. Returns at once when no
    /// machine is registered.
    pub async fn run(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        if self.is_empty().await {
            info!("No state machines, driver not started");
            return;
        }

        info!(period_ms = period.as_millis() as u64, "State machine driver started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }
            self.tick().await;
        }
        info!("State machine driver stopped");
    }
}

use anyhow::{Context, bail};
use chrono::Duration as ShelveDuration;
use domain::error::{DomainError, Result};
use domain::{AlarmView, EventArchive, TagHistory, TagName, TagType, WorkerInfo};
use infrastructure::config::{LoggingConfig, RuntimeConfig, SchedulerConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::alarm::{AlarmEngine, EngineSummary};
use crate::control::{Control, ControlEngine, Rule};
use crate::machine::{MachineView, ManagedMachine, StateMachineDriver};
use crate::tag::TagStore;
use crate::worker::{
    ContinuousWorker, ContinuousWorkerBuilder, Job, LOGGER_WORKER, PeriodicWorker, ReactiveWorker,
    Scheduler, TagLogger, WorkerHandle,
};

/// Outcome of a write through the application port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub result: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSummary {
    pub alarms: EngineSummary,
    pub machines: Vec<MachineView>,
    pub workers: Vec<WorkerInfo>,
}

#[derive(Default)]
struct Pending {
    continuous: Vec<(String, ContinuousWorker)>,
    periodic: Vec<PeriodicWorker>,
    /// Set once start has taken the queue; later registrations are refused.
    closed: bool,
}

impl Pending {
    fn ensure_open(&self, name: &str) -> Result<()> {
        if self.closed {
            return Err(DomainError::InvalidConfiguration(format!(
                "worker {name} registered after start"
            )));
        }
        Ok(())
    }
}

/// Wires the tag store, the engines and the workers together.
///
/// Everything is registered first, then [`Application::start`] attaches the
/// engines and spawns every unit.
pub struct Application {
    tags: Arc<TagStore>,
    alarms: Arc<AlarmEngine>,
    controls: Arc<ControlEngine>,
    machines: Arc<StateMachineDriver>,
    history: Arc<dyn TagHistory>,
    scheduler: SchedulerConfig,
    logging: RwLock<LoggingConfig>,
    handles: RwLock<Vec<WorkerHandle>>,
    pending: Mutex<Pending>,
    started: AtomicBool,
}

impl Application {
    pub fn new(archive: Arc<dyn EventArchive>, history: Arc<dyn TagHistory>) -> Self {
        Self::with_scheduler(SchedulerConfig::default(), archive, history)
    }

    pub fn with_scheduler(
        scheduler: SchedulerConfig,
        archive: Arc<dyn EventArchive>,
        history: Arc<dyn TagHistory>,
    ) -> Self {
        let tags = Arc::new(TagStore::new());
        Self {
            alarms: Arc::new(AlarmEngine::new(tags.clone(), archive)),
            controls: Arc::new(ControlEngine::new(tags.clone())),
            machines: Arc::new(StateMachineDriver::new(tags.clone())),
            tags,
            history,
            scheduler,
            logging: RwLock::new(LoggingConfig::default()),
            handles: RwLock::new(Vec::new()),
            pending: Mutex::new(Pending::default()),
            started: AtomicBool::new(false),
        }
    }

    /// Builds an application from declarative configuration: tags, alarms,
    /// controls and logged tags.
    pub async fn from_config(
        config: RuntimeConfig,
        archive: Arc<dyn EventArchive>,
        history: Arc<dyn TagHistory>,
    ) -> anyhow::Result<Self> {
        let app = Self::with_scheduler(config.scheduler, archive, history);

        for tag in config.tags {
            app.define_tag(&tag.name, tag.tag_type, tag.initial)
                .with_context(|| format!("failed to define tag {}", tag.name))?;
        }
        for alarm in config.alarms {
            let name = alarm.name.clone();
            app.append_alarm(alarm.into_alarm())
                .await
                .with_context(|| format!("failed to load alarm {name}"))?;
        }
        for control in config.controls {
            app.append_control(Control::from(control)).await;
        }
        app.set_logging(config.logging);

        info!(tags = app.tags.names().len(), "Application configured");
        Ok(app)
    }

    pub fn tags(&self) -> &Arc<TagStore> {
        &self.tags
    }

    pub fn alarms(&self) -> &Arc<AlarmEngine> {
        &self.alarms
    }

    pub fn controls(&self) -> &Arc<ControlEngine> {
        &self.controls
    }

    pub fn define_tag(&self, name: &TagName, tag_type: TagType, initial: Option<Value>) -> Result<()> {
        self.tags.define(name, tag_type, initial)
    }

    pub async fn append_alarm(&self, alarm: domain::Alarm) -> Result<()> {
        self.alarms.append(alarm).await
    }

    pub async fn append_rule(&self, rule: Rule) {
        self.controls.append_rule(rule).await
    }

    pub async fn append_control(&self, control: Control) {
        self.controls.append_control(control).await
    }

    pub async fn append_machine<M: ManagedMachine + 'static>(&self, machine: M) -> Result<()> {
        self.machines.append(machine).await
    }

    /// Replaces the logging section; the logging worker is built at start.
    pub fn set_logging(&self, logging: LoggingConfig) {
        *self.logging.write().unwrap_or_else(PoisonError::into_inner) = logging;
    }

    pub fn set_logged_tags(&self, tags: Vec<TagName>, period: Duration) {
        self.set_logging(LoggingConfig {
            period_ms: period.as_millis() as u64,
            tags,
        });
    }

    /// Registers a continuous worker. Pause and stop tags must already be
    /// defined, and the application must not be started yet.
    pub fn register(&self, builder: ContinuousWorkerBuilder) -> Result<WorkerHandle> {
        let (worker, handle) = builder.build(self.tags.clone())?;
        let name = handle
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("worker-{}", self.lock_handles().len()));
        self.push_continuous(name, worker, handle.clone())?;
        Ok(handle)
    }

    /// Registers a fixed-delay periodic worker. Refused once started.
    pub fn every<J: Job + 'static>(&self, name: impl Into<String>, period: Duration, job: J) -> Result<()> {
        let worker = PeriodicWorker::new(name, period, job, self.tags.clone());
        let mut pending = self.lock_pending();
        pending.ensure_open(worker.name())?;
        pending.periodic.push(worker);
        Ok(())
    }

    /// Attaches the engines and spawns every registered unit.
    ///
    /// A failed start leaves nothing running and may be retried once the
    /// configuration is fixed.
    pub async fn start(&self) -> anyhow::Result<Scheduler> {
        if self.started.swap(true, Ordering::SeqCst) {
            bail!("application already started");
        }
        if let Err(e) = self.prepare().await {
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let mut scheduler = Scheduler::new();
        scheduler.spawn_reactive(
            "alarms",
            ReactiveWorker::new(
                self.alarms.clone(),
                self.scheduler.alarm_period(),
                self.scheduler.drain_policy,
            ),
        );
        scheduler.spawn_reactive(
            "controls",
            ReactiveWorker::new(
                self.controls.clone(),
                self.scheduler.control_period(),
                self.scheduler.drain_policy,
            ),
        );
        scheduler.spawn_machines(self.machines.clone(), self.scheduler.machine_period());

        let pending = {
            let mut pending = self.lock_pending();
            let taken = std::mem::take(&mut *pending);
            pending.closed = true;
            taken
        };
        for (name, worker) in pending.continuous {
            scheduler.spawn_continuous(name, worker);
        }
        for worker in pending.periodic {
            scheduler.spawn_periodic(worker);
        }

        info!(units = scheduler.len(), "Application started");
        Ok(scheduler)
    }

    pub fn read(&self, name: &str) -> Result<Value> {
        self.tags.read(name)
    }

    /// Writes through the store. Type mismatches and unknown tags are
    /// reported as `result: false`.
    pub fn write(&self, name: &str, value: Value) -> WriteResult {
        match self.tags.write(name, value) {
            Ok(()) => WriteResult { result: true },
            Err(e) => {
                warn!(tag = %name, error = %e, "Write rejected");
                WriteResult { result: false }
            }
        }
    }

    pub async fn get_alarm(&self, name: &str) -> Option<AlarmView> {
        self.alarms.get_alarm(name).await
    }

    pub async fn get_alarms(&self) -> Vec<AlarmView> {
        self.alarms.get_alarms().await
    }

    /// `None` when no alarm has that name.
    pub async fn acknowledge_alarm(&self, name: &str) -> Option<AlarmView> {
        self.alarms.acknowledge(name).await
    }

    pub async fn shelve_alarm(&self, name: &str, duration: Option<ShelveDuration>) -> Option<AlarmView> {
        self.alarms.shelve(name, duration).await
    }

    pub async fn unshelve_alarm(&self, name: &str) -> Option<AlarmView> {
        self.alarms.unshelve(name).await
    }

    pub async fn alarm_summary(&self) -> EngineSummary {
        self.alarms.summary().await
    }

    pub async fn machines(&self) -> Vec<MachineView> {
        self.machines.machines().await
    }

    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.lock_handles().iter().map(WorkerHandle::info).collect()
    }

    pub fn worker(&self, name: &str) -> Option<WorkerHandle> {
        self.lock_handles()
            .iter()
            .find(|h| h.name() == Some(name))
            .cloned()
    }

    pub async fn summary(&self) -> AppSummary {
        AppSummary {
            alarms: self.alarm_summary().await,
            machines: self.machines().await,
            workers: self.workers(),
        }
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        self.alarms
            .attach_all()
            .await
            .context("failed to attach alarm engine")?;
        self.controls
            .attach_all()
            .await
            .context("failed to attach control engine")?;
        self.register_logger()
            .context("failed to register logging worker")?;
        Ok(())
    }

    fn register_logger(&self) -> Result<()> {
        let logging = self
            .logging
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if logging.tags.is_empty() {
            return Ok(());
        }

        for tag in &logging.tags {
            if !self.tags.contains(tag.as_str()) {
                return Err(DomainError::TagNotFound(tag.to_string()));
            }
        }

        let logger = TagLogger::new(logging.tags.clone(), self.history.clone());
        let (worker, handle) = ContinuousWorker::builder(logger)
            .name(LOGGER_WORKER)
            .period(logging.period())
            .build(self.tags.clone())?;
        self.push_continuous(LOGGER_WORKER.to_string(), worker, handle)?;
        info!(tags = logging.tags.len(), "Logging worker registered");
        Ok(())
    }

    fn push_continuous(&self, name: String, worker: ContinuousWorker, handle: WorkerHandle) -> Result<()> {
        // Pending stays locked so a concurrent start either spawns this worker or refuses it
        let mut pending = self.lock_pending();
        pending.ensure_open(&name)?;
        self.handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        pending.continuous.push((name, worker));
        Ok(())
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handles(&self) -> std::sync::RwLockReadGuard<'_, Vec<WorkerHandle>> {
        self.handles.read().unwrap_or_else(PoisonError::into_inner)
    }
}

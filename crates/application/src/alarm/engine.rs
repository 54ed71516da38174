use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::error::{DomainError, Result};
use domain::event::{AlarmRecord, AlarmSummary, EventArchive, EventRecord, SYSTEM_USER};
use domain::{Alarm, AlarmView};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::tag::{QueueReceiver, TagObserver, TagStore, notification_queue};
use crate::worker::ReactiveEngine;
use crate::worker::fault::panic_message;

const UNSHELVE_PRIORITY: u32 = 2;
const UNSHELVE_CRITICITY: u32 = 2;

/// Cheap aggregate of the configured alarms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSummary {
    pub length: usize,
    pub alarms: Vec<String>,
    pub tags: Vec<String>,
}

/// Everything one transition sends to the archive
struct Archived {
    record: AlarmRecord,
    summary: AlarmSummary,
    event: Option<EventRecord>,
}

impl Archived {
    fn new(alarm: &Alarm, transition: &domain::alarm::AlarmTransition) -> Self {
        Self {
            record: AlarmRecord::from_transition(alarm, transition),
            summary: AlarmSummary::from(alarm),
            event: None,
        }
    }
}

pub struct AlarmEngine {
    alarms: RwLock<Vec<Alarm>>,
    tags: Arc<TagStore>,
    archive: Arc<dyn EventArchive>,
    observer: TagObserver,
    receiver: Mutex<Option<QueueReceiver>>,
}

impl AlarmEngine {
    pub fn new(tags: Arc<TagStore>, archive: Arc<dyn EventArchive>) -> Self {
        let (observer, receiver) = notification_queue();
        Self {
            alarms: RwLock::new(Vec::new()),
            tags,
            archive,
            observer,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub async fn append(&self, alarm: Alarm) -> Result<()> {
        let mut alarms = self.alarms.write().await;
        if alarms.iter().any(|a| a.name() == alarm.name()) {
            return Err(DomainError::DuplicateAlarm(alarm.name().to_string()));
        }
        info!(alarm = %alarm.name(), tag = %alarm.tag(), "Alarm loaded");
        alarms.push(alarm);
        Ok(())
    }

    /// Subscribes the engine queue to every bound tag. Unknown tags fail here,
    /// not at tick time.
    pub async fn attach_all(&self) -> Result<()> {
        for tag in self.alarm_tags().await {
            self.tags.attach(&tag, self.observer.clone())?;
        }
        Ok(())
    }

    /// Distinct bound tags in configuration order.
    pub async fn alarm_tags(&self) -> Vec<String> {
        distinct_tags(&self.alarms.read().await)
    }

    pub async fn summary(&self) -> EngineSummary {
        // One guard so names and tags describe the same alarm set
        let guard = self.alarms.read().await;
        let alarms: Vec<String> = guard.iter().map(|a| a.name().to_string()).collect();
        let tags = distinct_tags(&guard);
        EngineSummary {
            length: alarms.len(),
            alarms,
            tags,
        }
    }

    pub async fn get_alarm(&self, name: &str) -> Option<AlarmView> {
        self.alarms
            .read()
            .await
            .iter()
            .find(|a| a.name() == name)
            .map(Alarm::view)
    }

    /// First alarm bound to `tag`
    pub async fn get_alarm_by_tag(&self, tag: &str) -> Option<AlarmView> {
        self.alarms
            .read()
            .await
            .iter()
            .find(|a| a.tag().as_str() == tag)
            .map(Alarm::view)
    }

    pub async fn get_alarms(&self) -> Vec<AlarmView> {
        self.alarms.read().await.iter().map(Alarm::view).collect()
    }

    /// Acknowledges an UNACK alarm; any other state is left as is.
    pub async fn acknowledge(&self, name: &str) -> Option<AlarmView> {
        self.apply(name, |alarm, now| alarm.acknowledge(now)).await
    }

    /// Shelves the alarm for `duration`, or until [`Self::unshelve`] when `None`.
    pub async fn shelve(&self, name: &str, duration: Option<Duration>) -> Option<AlarmView> {
        self.apply(name, |alarm, now| Some(alarm.shelve(duration, now)))
            .await
    }

    pub async fn unshelve(&self, name: &str) -> Option<AlarmView> {
        self.apply(name, |alarm, now| alarm.unshelve(now)).await
    }

    /// Re-evaluates alarms bound to `tag` against its latest value.
    pub async fn execute(&self, tag: &str) {
        self.execute_at(tag, Utc::now()).await
    }

    /// Same as [`Self::execute`] with an explicit clock.
    ///
    /// Shelved alarms whose deadline passed are returned to NORM first and
    /// are not evaluated again on this tick.
    pub async fn execute_at(&self, tag: &str, now: DateTime<Utc>) {
        let value = match self.tags.read(tag) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(tag = %tag, error = %e, "Alarm tick on unreadable tag");
                None
            }
        };

        let mut pending = Vec::new();
        {
            let mut alarms = self.alarms.write().await;
            for alarm in alarms.iter_mut() {
                if alarm.state() == domain::AlarmState::Shelved {
                    if alarm.shelve_expired(now) {
                        if let Some(transition) = alarm.unshelve(now) {
                            info!(alarm = %alarm.name(), "Alarm shelve expired");
                            let mut archived = Archived::new(alarm, &transition);
                            archived.event = Some(
                                EventRecord::new(
                                    SYSTEM_USER,
                                    transition.message.clone(),
                                    alarm.description(),
                                    UNSHELVE_PRIORITY,
                                    UNSHELVE_CRITICITY,
                                )
                                .with_classification(alarm.classification())
                                .at(now),
                            );
                            pending.push(archived);
                        }
                    }
                    continue;
                }

                if alarm.tag().as_str() != tag {
                    continue;
                }
                let Some(value) = &value else {
                    continue;
                };

                match catch_unwind(AssertUnwindSafe(|| alarm.update(value, now))) {
                    Ok(Ok(Some(transition))) => {
                        info!(
                            alarm = %alarm.name(),
                            from = %transition.from,
                            to = %transition.to,
                            "Alarm state changed"
                        );
                        pending.push(Archived::new(alarm, &transition));
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        error!(alarm = %alarm.name(), tag = %tag, error = %e, "Alarm condition failed");
                    }
                    Err(panic) => {
                        error!(alarm = %alarm.name(), tag = %tag, error = %panic_message(&*panic), "Alarm condition panicked");
                    }
                }
            }
        }

        for archived in pending {
            self.archive(archived).await;
        }
    }

    pub fn take_receiver(&self) -> Option<QueueReceiver> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn apply<F>(&self, name: &str, action: F) -> Option<AlarmView>
    where
        F: FnOnce(&mut Alarm, DateTime<Utc>) -> Option<domain::alarm::AlarmTransition>,
    {
        let now = Utc::now();
        let (view, archived) = {
            let mut alarms = self.alarms.write().await;
            let alarm = alarms.iter_mut().find(|a| a.name() == name)?;
            let archived = action(alarm, now).map(|transition| {
                info!(alarm = %name, from = %transition.from, to = %transition.to, "Alarm updated by operator");
                Archived::new(alarm, &transition)
            });
            (alarm.view(), archived)
        };

        if let Some(archived) = archived {
            self.archive(archived).await;
        }
        Some(view)
    }

    /// Archive failures are logged; alarm state is already committed.
    async fn archive(&self, archived: Archived) {
        let name = archived.record.name.clone();
        if let Err(e) = self.archive.write_alarm(archived.record).await {
            error!(alarm = %name, error = %e, "Failed to archive alarm record");
        }
        if let Err(e) = self.archive.upsert_summary(archived.summary).await {
            error!(alarm = %name, error = %e, "Failed to update alarm summary");
        }
        if let Some(event) = archived.event {
            if let Err(e) = self.archive.write_event(event).await {
                warn!(alarm = %name, error = %e, "Failed to archive event");
            }
        }
    }
}

fn distinct_tags(alarms: &[Alarm]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(alarms.len());
    for alarm in alarms {
        let tag = alarm.tag().to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[async_trait]
impl ReactiveEngine for AlarmEngine {
    fn kind(&self) -> &'static str {
        "alarm"
    }

    async fn bound_tags(&self) -> Vec<String> {
        self.alarm_tags().await
    }

    async fn execute(&self, tag: &str) {
        AlarmEngine::execute(self, tag).await
    }

    fn take_receiver(&self) -> Option<QueueReceiver> {
        AlarmEngine::take_receiver(self)
    }
}

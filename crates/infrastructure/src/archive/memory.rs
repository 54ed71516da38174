use async_trait::async_trait;
use domain::error::BoxError;
use domain::event::{AlarmRecord, AlarmSummary, EventArchive, EventRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Archive kept in process memory.
///
/// Stands in for the relational event/alarm tables; everything is lost on
/// restart.
#[derive(Default)]
pub struct InMemoryEventArchive {
    events: RwLock<Vec<EventRecord>>,
    alarms: RwLock<Vec<AlarmRecord>>,
    summaries: RwLock<HashMap<String, AlarmSummary>>,
}

impl InMemoryEventArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<EventRecord> {
        self.events.read().await.clone()
    }

    pub async fn alarm_records(&self) -> Vec<AlarmRecord> {
        self.alarms.read().await.clone()
    }

    /// History of a single alarm, oldest first
    pub async fn alarm_records_for(&self, name: &str) -> Vec<AlarmRecord> {
        self.alarms
            .read()
            .await
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    pub async fn summary(&self, name: &str) -> Option<AlarmSummary> {
        self.summaries.read().await.get(name).cloned()
    }

    pub async fn summaries(&self) -> Vec<AlarmSummary> {
        let mut rows: Vec<_> = self.summaries.read().await.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }
}

#[async_trait]
impl EventArchive for InMemoryEventArchive {
    async fn write_event(&self, event: EventRecord) -> Result<EventRecord, BoxError> {
        debug!(message = %event.message, "Event archived");
        self.events.write().await.push(event.clone());
        Ok(event)
    }

    async fn write_alarm(&self, record: AlarmRecord) -> Result<AlarmRecord, BoxError> {
        debug!(alarm = %record.name, state = %record.state, "Alarm record archived");
        self.alarms.write().await.push(record.clone());
        Ok(record)
    }

    async fn upsert_summary(&self, summary: AlarmSummary) -> Result<(), BoxError> {
        self.summaries
            .write()
            .await
            .insert(summary.name.clone(), summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::AlarmState;
    use uuid::Uuid;

    fn record(name: &str, state: AlarmState) -> AlarmRecord {
        AlarmRecord {
            id: Uuid::new_v4(),
            user: "System".into(),
            message: format!("{name} -> {state}"),
            description: String::new(),
            classification: "process".into(),
            priority: 1,
            date_time: Utc::now(),
            name: name.into(),
            state,
        }
    }

    fn summary(name: &str, state: AlarmState) -> AlarmSummary {
        AlarmSummary {
            name: name.into(),
            state,
            alarm_time: None,
            ack_time: None,
            description: String::new(),
            classification: "process".into(),
            priority: 1,
        }
    }

    #[tokio::test]
    async fn test_alarm_records_are_appended() {
        let archive = InMemoryEventArchive::new();
        archive
            .write_alarm(record("A", AlarmState::Unacknowledged))
            .await
            .unwrap();
        archive
            .write_alarm(record("B", AlarmState::Unacknowledged))
            .await
            .unwrap();
        archive
            .write_alarm(record("A", AlarmState::Acknowledged))
            .await
            .unwrap();

        assert_eq!(archive.alarm_records().await.len(), 3);
        let history = archive.alarm_records_for("A").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].state, AlarmState::Acknowledged);
    }

    #[tokio::test]
    async fn test_summary_is_replaced() {
        let archive = InMemoryEventArchive::new();
        archive
            .upsert_summary(summary("A", AlarmState::Unacknowledged))
            .await
            .unwrap();
        archive
            .upsert_summary(summary("A", AlarmState::Acknowledged))
            .await
            .unwrap();

        assert_eq!(archive.summaries().await.len(), 1);
        assert_eq!(
            archive.summary("A").await.unwrap().state,
            AlarmState::Acknowledged
        );
        assert!(archive.summary("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_events() {
        let archive = InMemoryEventArchive::new();
        let written = archive
            .write_event(EventRecord::new("operator", "Shift change", "", 1, 1))
            .await
            .unwrap();
        let events = archive.events().await;
        assert_eq!(events, vec![written]);
    }
}

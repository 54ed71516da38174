use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod archive;
pub use archive::EventArchive;

use crate::alarm::{Alarm, AlarmState, AlarmTransition};

/// User recorded for events raised by the runtime itself
pub const SYSTEM_USER: &str = "System";

const DEFAULT_EVENT_CLASSIFICATION: &str = "system";

/// Entry of the operator/system event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub user: String,
    pub message: String,
    pub description: String,
    pub classification: String,
    pub priority: u32,
    pub criticity: u32,
    pub date_time: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(
        user: impl Into<String>,
        message: impl Into<String>,
        description: impl Into<String>,
        priority: u32,
        criticity: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: user.into(),
            message: message.into(),
            description: description.into(),
            classification: DEFAULT_EVENT_CLASSIFICATION.to_string(),
            priority,
            criticity,
            date_time: Utc::now(),
        }
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }

    pub fn at(mut self, date_time: DateTime<Utc>) -> Self {
        self.date_time = date_time;
        self
    }
}

/// Immutable alarm history entry, one per transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: Uuid,
    pub user: String,
    pub message: String,
    pub description: String,
    pub classification: String,
    pub priority: u32,
    pub date_time: DateTime<Utc>,
    pub name: String,
    pub state: AlarmState,
}

impl AlarmRecord {
    /// Builds the history entry for a transition the alarm just went through.
    pub fn from_transition(alarm: &Alarm, transition: &AlarmTransition) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: SYSTEM_USER.to_string(),
            message: transition.message.clone(),
            description: alarm.description().to_string(),
            classification: alarm.classification().to_string(),
            priority: alarm.priority(),
            date_time: transition.timestamp,
            name: alarm.name().to_string(),
            state: transition.to,
        }
    }
}

/// Mutable "current status" row, one per alarm name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmSummary {
    pub name: String,
    pub state: AlarmState,
    pub alarm_time: Option<DateTime<Utc>>,
    pub ack_time: Option<DateTime<Utc>>,
    pub description: String,
    pub classification: String,
    pub priority: u32,
}

impl From<&Alarm> for AlarmSummary {
    fn from(alarm: &Alarm) -> Self {
        Self {
            name: alarm.name().to_string(),
            state: alarm.state(),
            alarm_time: alarm.alarm_time(),
            ack_time: alarm.ack_time(),
            description: alarm.description().to_string(),
            classification: alarm.classification().to_string(),
            priority: alarm.priority(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Operator};
    use crate::tag::TagName;
    use serde_json::json;

    #[test]
    fn test_event_record_creation() {
        let record = EventRecord::new("operator", "Pump started", "P-101", 2, 3);
        assert_eq!(record.user, "operator");
        assert_eq!(record.message, "Pump started");
        assert_eq!(record.priority, 2);
        assert_eq!(record.criticity, 3);
        assert_eq!(record.classification, "system");
    }

    #[test]
    fn test_alarm_record_from_transition() {
        let mut alarm = Alarm::new(
            "HighLevel",
            TagName::new("level").unwrap(),
            Condition::threshold(Operator::Greater, 10.0),
        )
        .with_description("Tank level high");
        let transition = alarm.update(&json!(12.0), Utc::now()).unwrap().unwrap();

        let record = AlarmRecord::from_transition(&alarm, &transition);
        assert_eq!(record.name, "HighLevel");
        assert_eq!(record.state, AlarmState::Unacknowledged);
        assert_eq!(record.description, "Tank level high");
        assert_eq!(record.date_time, transition.timestamp);

        let summary = AlarmSummary::from(&alarm);
        assert_eq!(summary.state, AlarmState::Unacknowledged);
        assert_eq!(summary.alarm_time, Some(transition.timestamp));
    }

    #[test]
    fn test_record_serialization() {
        let record = EventRecord::new("System", "Alarm unshelved", "", 2, 2);
        let json_str = serde_json::to_string(&record).unwrap();
        let back: EventRecord = serde_json::from_str(&json_str).unwrap();
        assert_eq!(back, record);
    }
}

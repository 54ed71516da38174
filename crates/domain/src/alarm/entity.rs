use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AlarmState, DEFAULT_CLASSIFICATION};
use crate::condition::Condition;
use crate::error::BoxError;
use crate::tag::TagName;

/// A state change of one alarm, the unit that gets archived.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmTransition {
    pub from: AlarmState,
    pub to: AlarmState,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Alarm bound to a single tag.
///
/// ```text
/// NORM/RTN --condition true-->  UNACK
/// UNACK    --acknowledge()-->   ACKED
/// ACKED    --condition false--> RTN
/// any      --shelve()-->        SHELVED
/// SHELVED  --unshelve()-->      NORM
/// ```
///
/// UNACK stays latched while the condition is false; only an operator
/// acknowledgement clears it.
#[derive(Debug, Clone)]
pub struct Alarm {
    name: String,
    tag: TagName,
    condition: Condition,
    description: String,
    classification: String,
    priority: u32,
    state: AlarmState,
    shelved_until: Option<DateTime<Utc>>,
    alarm_time: Option<DateTime<Utc>>,
    ack_time: Option<DateTime<Utc>>,
}

impl Alarm {
    pub fn new(name: impl Into<String>, tag: TagName, condition: Condition) -> Self {
        Self {
            name: name.into(),
            tag,
            condition,
            description: String::new(),
            classification: DEFAULT_CLASSIFICATION.to_string(),
            priority: 1,
            state: AlarmState::Normal,
            shelved_until: None,
            alarm_time: None,
            ack_time: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &TagName {
        &self.tag
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn shelved_until(&self) -> Option<DateTime<Utc>> {
        self.shelved_until
    }

    pub fn alarm_time(&self) -> Option<DateTime<Utc>> {
        self.alarm_time
    }

    pub fn ack_time(&self) -> Option<DateTime<Utc>> {
        self.ack_time
    }

    /// Evaluates the condition against a new tag value.
    ///
    /// Shelved alarms ignore updates. A failing condition leaves the state
    /// untouched and returns the error.
    pub fn update(
        &mut self,
        value: &Value,
        now: DateTime<Utc>,
    ) -> Result<Option<AlarmTransition>, BoxError> {
        if self.state == AlarmState::Shelved {
            return Ok(None);
        }

        let active = self.condition.evaluate(value)?;

        let transition = match (self.state, active) {
            (AlarmState::Normal | AlarmState::ReturnedToNormal, true) => {
                self.alarm_time = Some(now);
                self.ack_time = None;
                Some(self.transition_to(
                    AlarmState::Unacknowledged,
                    format!("Alarm {} triggered", self.name),
                    now,
                ))
            }
            (AlarmState::Acknowledged, false) => Some(self.transition_to(
                AlarmState::ReturnedToNormal,
                format!("Alarm {} returned to normal", self.name),
                now,
            )),
            _ => None,
        };

        Ok(transition)
    }

    /// Has effect only while UNACK.
    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> Option<AlarmTransition> {
        if self.state != AlarmState::Unacknowledged {
            return None;
        }
        self.ack_time = Some(now);
        Some(self.transition_to(
            AlarmState::Acknowledged,
            format!("Alarm {} acknowledged", self.name),
            now,
        ))
    }

    /// Shelves the alarm from any state. `None` shelves until `unshelve`.
    pub fn shelve(&mut self, duration: Option<Duration>, now: DateTime<Utc>) -> AlarmTransition {
        self.shelved_until = duration.map(|d| now + d);
        let message = match self.shelved_until {
            Some(until) => format!("Alarm {} shelved until {}", self.name, until.to_rfc3339()),
            None => format!("Alarm {} shelved", self.name),
        };
        self.transition_to(AlarmState::Shelved, message, now)
    }

    pub fn unshelve(&mut self, now: DateTime<Utc>) -> Option<AlarmTransition> {
        if self.state != AlarmState::Shelved {
            return None;
        }
        self.shelved_until = None;
        Some(self.transition_to(
            AlarmState::Normal,
            format!("Alarm {} unshelved", self.name),
            now,
        ))
    }

    /// True when shelved with a deadline that `now` has reached.
    pub fn shelve_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == AlarmState::Shelved && self.shelved_until.is_some_and(|until| now >= until)
    }

    pub fn view(&self) -> AlarmView {
        AlarmView {
            name: self.name.clone(),
            tag: self.tag.to_string(),
            state: self.state,
            priority: self.priority,
            description: self.description.clone(),
            classification: self.classification.clone(),
            shelved_until: self.shelved_until,
            alarm_time: self.alarm_time,
            ack_time: self.ack_time,
        }
    }

    fn transition_to(
        &mut self,
        to: AlarmState,
        message: String,
        now: DateTime<Utc>,
    ) -> AlarmTransition {
        let from = self.state;
        self.state = to;
        AlarmTransition {
            from,
            to,
            message,
            timestamp: now,
        }
    }
}

/// Serializable read model of an alarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmView {
    pub name: String,
    pub tag: String,
    pub state: AlarmState,
    pub priority: u32,
    pub description: String,
    pub classification: String,
    pub shelved_until: Option<DateTime<Utc>>,
    pub alarm_time: Option<DateTime<Utc>>,
    pub ack_time: Option<DateTime<Utc>>,
}

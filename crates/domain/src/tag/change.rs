use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Change event produced by every successful tag write.
/// One event is delivered to each observer attached to the written name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagChange {
    /// Name as written, dotted names included
    pub tag: String,
    /// The committed value
    pub value: Value,
    /// Commit time
    pub timestamp: DateTime<Utc>,
}

impl TagChange {
    pub fn new(tag: impl Into<String>, value: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            tag: tag.into(),
            value,
            timestamp,
        }
    }
}

/// Current state of a root tag as exposed to read-side collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagSnapshot {
    pub name: String,
    pub tag_type: super::TagType,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_change_creation() {
        let now = Utc::now();
        let change = TagChange::new("tank/level", json!(15.5), now);

        assert_eq!(change.tag, "tank/level");
        assert_eq!(change.value, json!(15.5));
        assert_eq!(change.timestamp, now);
    }
}

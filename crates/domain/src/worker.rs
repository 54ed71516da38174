use serde::{Deserialize, Serialize};

/// Continuous worker status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkerStatus {
    /// Not started yet, or terminated by its stop tag
    #[default]
    Stop,
    Running,
    Pause,
    /// Last payload invocation failed
    Error,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::Running => "Running",
            Self::Pause => "Pause",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable description of a registered worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub name: Option<String>,
    /// Period in seconds
    pub period: f64,
    pub pause_tag: Option<String>,
    pub stop_tag: Option<String>,
    pub status: WorkerStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stop() {
        assert_eq!(WorkerStatus::default(), WorkerStatus::Stop);
    }

    #[test]
    fn test_info_serialization() {
        let info = WorkerInfo {
            name: Some("pump_cycle".into()),
            period: 0.5,
            pause_tag: Some("pump_pause".into()),
            stop_tag: None,
            status: WorkerStatus::Running,
        };
        let v = serde_json::to_value(&info).unwrap();
        assert_eq!(v["status"], "Running");
        assert_eq!(v["period"], 0.5);
        assert_eq!(v["stop_tag"], serde_json::Value::Null);
    }
}

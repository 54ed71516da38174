use serde::{Deserialize, Serialize};

/// Alarm lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AlarmState {
    /// Condition inactive
    #[default]
    #[serde(rename = "NORM")]
    Normal,
    /// Condition became active, operator has not acknowledged it
    #[serde(rename = "UNACK")]
    Unacknowledged,
    /// Operator acknowledged, condition still active
    #[serde(rename = "ACKED")]
    Acknowledged,
    /// Returned to normal after an acknowledged episode
    #[serde(rename = "RTN")]
    ReturnedToNormal,
    /// Suppressed by an operator until `shelved_until`
    #[serde(rename = "SHELVED")]
    Shelved,
}

impl AlarmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORM",
            Self::Unacknowledged => "UNACK",
            Self::Acknowledged => "ACKED",
            Self::ReturnedToNormal => "RTN",
            Self::Shelved => "SHELVED",
        }
    }

    /// NORM and RTN both mean the condition is inactive.
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal | Self::ReturnedToNormal)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Unacknowledged | Self::Acknowledged)
    }
}

impl std::fmt::Display for AlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

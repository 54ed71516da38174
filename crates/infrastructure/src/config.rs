use config::{Config, ConfigError, Environment, File, FileFormat};
use domain::alarm::DEFAULT_CLASSIFICATION;
use domain::{Alarm, Condition, TagName, TagType, Threshold};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many queued tag changes a reactive worker handles per tick
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrainPolicy {
    /// At most one change per period
    #[default]
    One,
    /// Every change already queued when the worker wakes up
    All,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TagConfig {
    pub name: TagName,
    #[serde(rename = "type")]
    pub tag_type: TagType,
    #[serde(default)]
    pub initial: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlarmConfig {
    pub name: String,
    pub tag: TagName,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_classification")]
    pub classification: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub trigger: Threshold,
}

fn default_classification() -> String {
    DEFAULT_CLASSIFICATION.to_string()
}

fn default_priority() -> u32 {
    1
}

impl AlarmConfig {
    pub fn into_alarm(self) -> Alarm {
        Alarm::new(self.name, self.tag, Condition::from(self.trigger))
            .with_description(self.description)
            .with_classification(self.classification)
            .with_priority(self.priority)
    }
}

/// Declarative control: when `trigger` holds on `tag`, write `value` to `target`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ControlConfig {
    pub name: String,
    pub tag: TagName,
    pub trigger: Threshold,
    pub target: TagName,
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_alarm_period")]
    pub alarm_period_ms: u64,
    #[serde(default = "default_control_period")]
    pub control_period_ms: u64,
    #[serde(default = "default_machine_period")]
    pub machine_period_ms: u64,
    #[serde(default)]
    pub drain_policy: DrainPolicy,
}

fn default_alarm_period() -> u64 {
    250
}
fn default_control_period() -> u64 {
    100
}
fn default_machine_period() -> u64 {
    250
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            alarm_period_ms: default_alarm_period(),
            control_period_ms: default_control_period(),
            machine_period_ms: default_machine_period(),
            drain_policy: DrainPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn alarm_period(&self) -> Duration {
        Duration::from_millis(self.alarm_period_ms)
    }

    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }

    pub fn machine_period(&self) -> Duration {
        Duration::from_millis(self.machine_period_ms)
    }
}

/// Tags sampled into the history store by the logging worker
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_period")]
    pub period_ms: u64,
    #[serde(default)]
    pub tags: Vec<TagName>,
}

fn default_logging_period() -> u64 {
    500
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            period_ms: default_logging_period(),
            tags: Vec::new(),
        }
    }
}

impl LoggingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub tags: Vec<TagConfig>,
    #[serde(default)]
    pub alarms: Vec<AlarmConfig>,
    #[serde(default)]
    pub controls: Vec<ControlConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    pub fn load(config_dir: &str, run_mode: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Base file is REQUIRED to avoid starting with an empty tag table
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            // Run mode overrides (e.g. config/development.toml)
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. RACK__SCHEDULER__DRAIN_POLICY=all)
            .add_source(Environment::with_prefix("RACK").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parses a TOML document, used by tests and embedded setups.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Operator;

    const SAMPLE: &str = r#"
        [[tags]]
        name = "level"
        type = "float"
        initial = 0.0

        [[tags]]
        name = "pump_on"
        type = "bool"

        [[alarms]]
        name = "HighLevel"
        tag = "level"
        description = "Tank level high"
        priority = 2
        trigger = { operator = "Greater", setpoint = 10.0 }

        [[controls]]
        name = "StartPump"
        tag = "level"
        trigger = { operator = "GreaterOrEqual", setpoint = 8.0 }
        target = "pump_on"
        value = true

        [scheduler]
        drain_policy = "all"

        [logging]
        period_ms = 1000
        tags = ["level"]
    "#;

    #[test]
    fn test_parse_full_document() {
        let config = RuntimeConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.tags[0].tag_type, TagType::Float);
        assert!(config.tags[1].initial.is_none());

        let alarm = &config.alarms[0];
        assert_eq!(alarm.name, "HighLevel");
        assert_eq!(alarm.classification, "process");
        assert_eq!(alarm.trigger.operator, Operator::Greater);

        assert_eq!(config.controls[0].target.as_str(), "pump_on");
        assert_eq!(config.controls[0].value, serde_json::json!(true));

        assert_eq!(config.scheduler.drain_policy, DrainPolicy::All);
        assert_eq!(config.scheduler.alarm_period(), Duration::from_millis(250));
        assert_eq!(config.logging.period(), Duration::from_secs(1));
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_toml("").unwrap();
        assert!(config.tags.is_empty());
        assert_eq!(config.scheduler.drain_policy, DrainPolicy::One);
        assert_eq!(config.scheduler.control_period_ms, 100);
        assert_eq!(config.logging.period_ms, 500);
    }

    #[test]
    fn test_alarm_config_into_alarm() {
        let config = RuntimeConfig::from_toml(SAMPLE).unwrap();
        let alarm = config.alarms[0].clone().into_alarm();
        assert_eq!(alarm.name(), "HighLevel");
        assert_eq!(alarm.tag().as_str(), "level");
        assert_eq!(alarm.priority(), 2);
    }

    #[test]
    fn test_invalid_tag_name_rejected() {
        let result = RuntimeConfig::from_toml(
            r#"
            [[tags]]
            name = "bad name"
            type = "float"
            "#,
        );
        assert!(result.is_err());
    }
}

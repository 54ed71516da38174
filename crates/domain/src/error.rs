use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid tag name: {0}")]
    InvalidTagName(String),

    #[error("Tag already defined: {0}")]
    DuplicateTag(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Invalid tag value: {0}")]
    InvalidValue(String),

    #[error("Alarm already defined: {0}")]
    DuplicateAlarm(String),

    #[error("Alarm not found: {0}")]
    AlarmNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Error type returned by user supplied callables (conditions, actions, jobs)
/// and by external ports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Separator between a root tag and a field of its structured value.
pub const FIELD_SEPARATOR: char = '.';

/// Value object representing a Tag name
///
/// Rules:
/// - Every segment must be non-empty
/// - Segments contain only alphanumeric, underscore, hyphen and forward slash
/// - Max length 100 characters
///
/// A dotted name (`"pump.speed"`) addresses the `speed` field inside the
/// structured value of the root tag `pump`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    /// Create a new TagName with validation
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(DomainError::InvalidTagName(
                "Tag name cannot be empty".to_string(),
            ));
        }

        if name.len() > 100 {
            return Err(DomainError::InvalidTagName(format!(
                "Tag name too long: {} chars (max 100)",
                name.len()
            )));
        }

        for segment in name.split(FIELD_SEPARATOR) {
            if segment.is_empty() {
                return Err(DomainError::InvalidTagName(format!(
                    "Tag name {name} contains an empty segment"
                )));
            }
            if !segment
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '/')
            {
                return Err(DomainError::InvalidTagName(format!(
                    "Tag name {name} must contain only alphanumeric, underscore, hyphen, and forward slash"
                )));
            }
        }

        Ok(Self(name))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name addresses a field of a structured tag.
    pub fn is_dotted(&self) -> bool {
        self.0.contains(FIELD_SEPARATOR)
    }

    /// Name of the root tag that owns the storage slot.
    pub fn root(&self) -> &str {
        self.0
            .split_once(FIELD_SEPARATOR)
            .map(|(root, _)| root)
            .unwrap_or(&self.0)
    }

    /// Field path below the root, empty for plain names.
    pub fn fields(&self) -> Vec<&str> {
        self.0.split(FIELD_SEPARATOR).skip(1).collect()
    }
}

impl std::fmt::Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TagName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TagName {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TagName> for String {
    fn from(name: TagName) -> Self {
        name.0
    }
}

use domain::error::BoxError;
use domain::{Condition, TagName};
use infrastructure::config::ControlConfig;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::tag::TagStore;

pub type RuleAction = Arc<dyn Fn(&TagStore, &Value) -> Result<(), BoxError> + Send + Sync>;

/// Condition/action pair over one or more tags.
///
/// The condition sees the value of whichever bound tag changed; the action
/// receives the store so it can read other tags and write derived ones.
#[derive(Clone)]
pub struct Rule {
    name: String,
    tags: Vec<TagName>,
    condition: Condition,
    action: RuleAction,
}

impl Rule {
    pub fn new<F>(name: impl Into<String>, tags: Vec<TagName>, condition: Condition, action: F) -> Self
    where
        F: Fn(&TagStore, &Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            tags,
            condition,
            action: Arc::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[TagName] {
        &self.tags
    }

    pub fn is_bound_to(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.as_str() == tag)
    }

    /// Returns whether the action fired.
    pub fn evaluate(&self, store: &TagStore, value: &Value) -> Result<bool, BoxError> {
        if !self.condition.evaluate(value)? {
            return Ok(false);
        }
        (self.action)(store, value)?;
        Ok(true)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

/// Declarative control: when `condition` holds on `tag`, write `value` to `target`.
#[derive(Debug, Clone)]
pub struct Control {
    name: String,
    tag: TagName,
    condition: Condition,
    target: TagName,
    value: Value,
}

impl Control {
    pub fn new(
        name: impl Into<String>,
        tag: TagName,
        condition: Condition,
        target: TagName,
        value: Value,
    ) -> Self {
        Self {
            name: name.into(),
            tag,
            condition,
            target,
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &TagName {
        &self.tag
    }

    pub fn target(&self) -> &TagName {
        &self.target
    }

    /// Returns whether the target was written.
    pub fn evaluate(&self, store: &TagStore, value: &Value) -> Result<bool, BoxError> {
        if !self.condition.evaluate(value)? {
            return Ok(false);
        }
        store.write(self.target.as_str(), self.value.clone())?;
        Ok(true)
    }
}

impl From<ControlConfig> for Control {
    fn from(config: ControlConfig) -> Self {
        Self::new(
            config.name,
            config.tag,
            Condition::from(config.trigger),
            config.target,
            config.value,
        )
    }
}

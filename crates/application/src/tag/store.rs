use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use domain::error::{DomainError, Result};
use domain::tag::{TagChange, TagName, TagSnapshot, TagType};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::command::{TagCommand, TagResponse};
use super::observer::TagObserver;

/// Storage slot of a root tag. Observers are keyed by the exact name they
/// attached to, dotted names included, so that a write and its fan-out
/// happen under the same entry lock.
struct TagEntry {
    tag_type: TagType,
    value: Value,
    timestamp: DateTime<Utc>,
    observers: HashMap<String, Vec<TagObserver>>,
}

/// Current value table shared by every worker.
///
/// Writes commit the value, stamp it and enqueue one [`TagChange`] per
/// attached observer while holding the root tag's lock: a reader that sees
/// the new value can rely on the notification being queued already.
#[derive(Default)]
pub struct TagStore {
    tags: DashMap<String, TagEntry>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a root tag. `initial` defaults to the type's zero value.
    pub fn define(&self, name: &TagName, tag_type: TagType, initial: Option<Value>) -> Result<()> {
        if name.is_dotted() {
            return Err(DomainError::InvalidTagName(format!(
                "{name} addresses a field and cannot be defined"
            )));
        }

        let value = match initial {
            Some(raw) => tag_type.coerce(raw)?,
            None => tag_type.default_value(),
        };

        match self.tags.entry(name.to_string()) {
            Entry::Occupied(_) => Err(DomainError::DuplicateTag(name.to_string())),
            Entry::Vacant(slot) => {
                debug!(tag = %name, tag_type = %tag_type, "Tag defined");
                slot.insert(TagEntry {
                    tag_type,
                    value,
                    timestamp: Utc::now(),
                    observers: HashMap::new(),
                });
                Ok(())
            }
        }
    }

    /// True when `name` resolves to a defined root tag.
    pub fn contains(&self, name: &str) -> bool {
        TagName::new(name)
            .map(|n| self.tags.contains_key(n.root()))
            .unwrap_or(false)
    }

    pub fn read(&self, name: &str) -> Result<Value> {
        let tag = parse(name)?;
        let entry = self
            .tags
            .get(tag.root())
            .ok_or_else(|| DomainError::TagNotFound(name.to_string()))?;

        let mut current = &entry.value;
        for field in tag.fields() {
            current = current
                .get(field)
                .ok_or_else(|| DomainError::TagNotFound(name.to_string()))?;
        }
        Ok(current.clone())
    }

    /// Declared type of the root tag. Fields of structured tags are untyped.
    pub fn read_type(&self, name: &str) -> Result<TagType> {
        let tag = parse(name)?;
        self.tags
            .get(tag.root())
            .map(|entry| entry.tag_type)
            .ok_or_else(|| DomainError::TagNotFound(name.to_string()))
    }

    /// Time of the last write to the root tag.
    pub fn timestamp(&self, name: &str) -> Result<DateTime<Utc>> {
        let tag = parse(name)?;
        self.tags
            .get(tag.root())
            .map(|entry| entry.timestamp)
            .ok_or_else(|| DomainError::TagNotFound(name.to_string()))
    }

    /// Writes a value and notifies observers of `name`.
    ///
    /// Plain names are coerced to the declared type; dotted names store the
    /// raw value in the addressed field, creating it when missing.
    pub fn write(&self, name: &str, value: Value) -> Result<()> {
        let tag = parse(name)?;
        let mut entry = self
            .tags
            .get_mut(tag.root())
            .ok_or_else(|| DomainError::TagNotFound(name.to_string()))?;

        let committed = if tag.is_dotted() {
            set_field(&mut entry.value, &tag.fields(), value.clone(), name)?;
            value
        } else {
            let coerced = entry.tag_type.coerce(value)?;
            entry.value = coerced.clone();
            coerced
        };

        let now = Utc::now();
        entry.timestamp = now;

        if let Some(observers) = entry.observers.get_mut(name) {
            let change = TagChange::new(name, committed, now);
            observers.retain(|observer| {
                let delivered = observer.notify(change.clone());
                if !delivered {
                    trace!(tag = %name, "Dropping closed observer");
                }
                delivered
            });
        }

        Ok(())
    }

    /// Registers `observer` for writes to `name`. Attaching twice is a no-op.
    pub fn attach(&self, name: &str, observer: TagObserver) -> Result<()> {
        let tag = parse(name)?;
        let mut entry = self
            .tags
            .get_mut(tag.root())
            .ok_or_else(|| DomainError::TagNotFound(name.to_string()))?;

        let observers = entry.observers.entry(name.to_string()).or_default();
        if !observers.iter().any(|o| o.same_queue(&observer)) {
            observers.push(observer);
            debug!(tag = %name, observers = observers.len(), "Observer attached");
        }
        Ok(())
    }

    /// Removes `observer` from `name`. Detaching an unknown pair is a no-op.
    pub fn detach(&self, name: &str, observer: &TagObserver) -> Result<()> {
        let tag = parse(name)?;
        let mut entry = self
            .tags
            .get_mut(tag.root())
            .ok_or_else(|| DomainError::TagNotFound(name.to_string()))?;

        if let Some(observers) = entry.observers.get_mut(name) {
            observers.retain(|o| !o.same_queue(observer));
            if observers.is_empty() {
                entry.observers.remove(name);
            }
        }
        Ok(())
    }

    /// Number of observers attached to exactly `name`.
    pub fn observer_count(&self, name: &str) -> usize {
        TagName::new(name)
            .ok()
            .and_then(|tag| {
                self.tags
                    .get(tag.root())
                    .map(|entry| entry.observers.get(name).map_or(0, Vec::len))
            })
            .unwrap_or(0)
    }

    /// Root tag names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tags.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn snapshot(&self) -> Vec<TagSnapshot> {
        let mut tags: Vec<TagSnapshot> = self
            .tags
            .iter()
            .map(|e| TagSnapshot {
                name: e.key().clone(),
                tag_type: e.tag_type,
                value: e.value.clone(),
                timestamp: e.timestamp,
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    /// Uniform command entry point; same guarantees as the direct calls.
    pub fn request(&self, command: TagCommand) -> Result<TagResponse> {
        match command {
            TagCommand::Attach { name, observer } => {
                self.attach(&name, observer).map(|_| TagResponse::Done)
            }
            TagCommand::Detach { name, observer } => {
                self.detach(&name, &observer).map(|_| TagResponse::Done)
            }
            TagCommand::Read { name } => self.read(&name).map(TagResponse::Value),
            TagCommand::Write { name, value } => {
                self.write(&name, value).map(|_| TagResponse::Done)
            }
        }
    }
}

/// Names that fail validation can never have been defined.
fn parse(name: &str) -> Result<TagName> {
    TagName::new(name).map_err(|_| DomainError::TagNotFound(name.to_string()))
}

fn set_field(root: &mut Value, fields: &[&str], value: Value, name: &str) -> Result<()> {
    let Some((last, parents)) = fields.split_last() else {
        return Err(DomainError::InvalidTagName(name.to_string()));
    };

    let mut current = root;
    for field in parents {
        let object = current.as_object_mut().ok_or_else(|| {
            DomainError::InvalidValue(format!("{name}: parent of {field} is not structured"))
        })?;
        current = object
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let object = current.as_object_mut().ok_or_else(|| {
        DomainError::InvalidValue(format!("{name}: parent of {last} is not structured"))
    })?;
    object.insert(last.to_string(), value);
    Ok(())
}

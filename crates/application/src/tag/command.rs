use serde_json::Value;

use super::observer::TagObserver;

/// Tag store operations expressed as data, see [`super::TagStore::request`].
#[derive(Debug, Clone)]
pub enum TagCommand {
    Attach { name: String, observer: TagObserver },
    Detach { name: String, observer: TagObserver },
    Read { name: String },
    Write { name: String, value: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagResponse {
    Done,
    Value(Value),
}

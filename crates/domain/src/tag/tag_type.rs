use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declared type of a root tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Float,
    Int,
    #[serde(alias = "string")]
    Str,
    Bool,
    /// Structured value addressed through dotted names
    Composite,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Composite => "composite",
        }
    }

    /// Zero value used when a tag is defined without an initial value.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Float => Value::from(0.0),
            Self::Int => Value::from(0),
            Self::Str => Value::from(""),
            Self::Bool => Value::Bool(false),
            Self::Composite => Value::Object(Map::new()),
        }
    }

    /// Coerces a raw value into this type.
    ///
    /// Strings are parsed for numeric types. Booleans accept the literals
    /// `"true"` and `"false"` (case-sensitive) and otherwise fall back to
    /// truthiness.
    pub fn coerce(&self, raw: Value) -> Result<Value> {
        match self {
            Self::Float => {
                let num = match &raw {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                    _ => None,
                };
                // NaN and infinities have no JSON form
                num.filter(|f| f.is_finite())
                    .map(Value::from)
                    .ok_or_else(|| DomainError::InvalidValue(format!("{raw} is not a float")))
            }
            Self::Int => {
                let num = match &raw {
                    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    Value::Bool(b) => Some(i64::from(*b)),
                    _ => None,
                };
                num.map(Value::from)
                    .ok_or_else(|| DomainError::InvalidValue(format!("{raw} is not an int")))
            }
            Self::Str => Ok(match raw {
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            }),
            Self::Bool => Ok(Value::Bool(match &raw {
                Value::String(s) if s == "true" => true,
                Value::String(s) if s == "false" => false,
                other => is_truthy(other),
            })),
            Self::Composite => match raw {
                Value::Object(_) => Ok(raw),
                other => Err(DomainError::InvalidValue(format!(
                    "{other} is not a structured value"
                ))),
            },
        }
    }
}

impl std::fmt::Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truthiness of a JSON value: null, false, zero and empty containers are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

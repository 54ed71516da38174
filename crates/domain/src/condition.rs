use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub enum Operator {
    Equal,
    LessOrEqual,
    GreaterOrEqual,
    NotEqual,
    Less,
    Greater,
}

impl Operator {
    pub fn compare(&self, value: f64, setpoint: f64) -> bool {
        match self {
            Operator::Equal => (value - setpoint).abs() < f64::EPSILON,
            Operator::NotEqual => (value - setpoint).abs() >= f64::EPSILON,
            Operator::LessOrEqual => value <= setpoint,
            Operator::GreaterOrEqual => value >= setpoint,
            Operator::Greater => value > setpoint,
            Operator::Less => value < setpoint,
        }
    }
}

fn default_operator() -> Operator {
    Operator::Greater
}

/// Declarative threshold, the form conditions take in configuration files.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Threshold {
    #[serde(default = "default_operator")]
    pub operator: Operator,
    pub setpoint: f64,
}

pub type Predicate = Arc<dyn Fn(&Value) -> Result<bool, BoxError> + Send + Sync>;

/// Condition evaluated against the latest value of a tag
#[derive(Clone)]
pub enum Condition {
    Threshold(Threshold),
    /// Opaque callable supplied by the embedding application
    Custom(Predicate),
}

impl Condition {
    pub fn threshold(operator: Operator, setpoint: f64) -> Self {
        Self::Threshold(Threshold { operator, setpoint })
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn evaluate(&self, value: &Value) -> Result<bool, BoxError> {
        match self {
            Condition::Threshold(Threshold { operator, setpoint }) => {
                let num = numeric(value)
                    .ok_or_else(|| format!("value {value} is not numeric"))?;
                Ok(operator.compare(num, *setpoint))
            }
            Condition::Custom(predicate) => predicate(value),
        }
    }
}

impl From<Threshold> for Condition {
    fn from(threshold: Threshold) -> Self {
        Self::Threshold(threshold)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Threshold(t) => f.debug_tuple("Threshold").field(t).finish(),
            Condition::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Numeric view of a tag value. Booleans map to 0/1.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BoxError;

/// One logged value of a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

/// History/query port. Written by the logging worker, read by
/// trend and waveform consumers.
#[async_trait]
pub trait TagHistory: Send + Sync {
    async fn append(&self, tag: &str, value: Value, timestamp: DateTime<Utc>)
    -> Result<(), BoxError>;

    async fn get_history(&self, tag: &str) -> Result<Vec<Sample>, BoxError>;

    /// Samples with `t0 <= timestamp <= t1`, oldest first.
    async fn get_waveform(
        &self,
        tag: &str,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<Vec<Sample>, BoxError>;
}

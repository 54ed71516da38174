use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::BoxError;
use domain::history::{Sample, TagHistory};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded per-tag trend buffer. Oldest samples are dropped first.
pub struct InMemoryTagHistory {
    samples: RwLock<HashMap<String, VecDeque<Sample>>>,
    capacity: usize,
}

impl InMemoryTagHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self, tag: &str) -> usize {
        self.samples.read().await.get(tag).map_or(0, VecDeque::len)
    }
}

impl Default for InMemoryTagHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TagHistory for InMemoryTagHistory {
    async fn append(
        &self,
        tag: &str,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        let mut samples = self.samples.write().await;
        let series = samples.entry(tag.to_string()).or_default();
        if series.len() == self.capacity {
            series.pop_front();
        }
        series.push_back(Sample { value, timestamp });
        Ok(())
    }

    async fn get_history(&self, tag: &str) -> Result<Vec<Sample>, BoxError> {
        Ok(self
            .samples
            .read()
            .await
            .get(tag)
            .map(|series| series.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_waveform(
        &self,
        tag: &str,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<Vec<Sample>, BoxError> {
        if t1 < t0 {
            return Err(format!("invalid waveform window: {t0} is after {t1}").into());
        }
        Ok(self
            .samples
            .read()
            .await
            .get(tag)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.timestamp >= t0 && s.timestamp <= t1)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn test_history_in_write_order() {
        let history = InMemoryTagHistory::new();
        let t = Utc::now();
        history.append("level", json!(1.0), t).await.unwrap();
        history
            .append("level", json!(2.0), t + Duration::seconds(1))
            .await
            .unwrap();

        let samples = history.get_history("level").await.unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].value, json!(2.0));
        assert!(history.get_history("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let history = InMemoryTagHistory::with_capacity(2);
        let t = Utc::now();
        for i in 0..3 {
            history
                .append("level", json!(i), t + Duration::seconds(i))
                .await
                .unwrap();
        }
        let samples = history.get_history("level").await.unwrap();
        assert_eq!(history.len("level").await, 2);
        assert_eq!(samples[0].value, json!(1));
    }

    #[tokio::test]
    async fn test_waveform_window() {
        let history = InMemoryTagHistory::new();
        let t = Utc::now();
        for i in 0..10 {
            history
                .append("flow", json!(i), t + Duration::seconds(i))
                .await
                .unwrap();
        }

        let wave = history
            .get_waveform("flow", t + Duration::seconds(2), t + Duration::seconds(4))
            .await
            .unwrap();
        let values: Vec<_> = wave.into_iter().map(|s| s.value).collect();
        assert_eq!(values, vec![json!(2), json!(3), json!(4)]);

        assert!(
            history
                .get_waveform("flow", t + Duration::seconds(4), t)
                .await
                .is_err()
        );
    }
}

use async_trait::async_trait;
use chrono::Utc;
use domain::error::BoxError;
use domain::{TagHistory, TagName};
use std::sync::Arc;

use super::job::Job;
use crate::tag::TagStore;

pub const LOGGER_WORKER: &str = "logger";

/// Payload of the logging worker: samples every logged tag into the
/// history port.
pub struct TagLogger {
    tags: Vec<TagName>,
    history: Arc<dyn TagHistory>,
}

impl TagLogger {
    pub fn new(tags: Vec<TagName>, history: Arc<dyn TagHistory>) -> Self {
        Self { tags, history }
    }

    pub fn tags(&self) -> &[TagName] {
        &self.tags
    }
}

#[async_trait]
impl Job for TagLogger {
    async fn run(&self, store: &TagStore) -> Result<(), BoxError> {
        let now = Utc::now();
        for tag in &self.tags {
            let value = store.read(tag.as_str())?;
            self.history.append(tag.as_str(), value, now).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::TagType;
    use infrastructure::InMemoryTagHistory;
    use serde_json::json;

    #[tokio::test]
    async fn test_samples_every_tag() {
        let store = TagStore::new();
        let level = TagName::new("level").unwrap();
        let pump = TagName::new("pump").unwrap();
        store.define(&level, TagType::Float, Some(json!(1.5))).unwrap();
        store.define(&pump, TagType::Bool, None).unwrap();

        let history = Arc::new(InMemoryTagHistory::new());
        let logger = TagLogger::new(vec![level, pump], history.clone());

        logger.run(&store).await.unwrap();
        store.write("level", json!(2.5)).unwrap();
        logger.run(&store).await.unwrap();

        let samples = history.get_history("level").await.unwrap();
        let values: Vec<_> = samples.into_iter().map(|s| s.value).collect();
        assert_eq!(values, vec![json!(1.5), json!(2.5)]);
        assert_eq!(history.get_history("pump").await.unwrap().len(), 2);
    }
}

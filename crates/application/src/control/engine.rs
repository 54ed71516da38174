use async_trait::async_trait;
use domain::error::{DomainError, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use super::rule::{Control, Rule};
use crate::tag::{QueueReceiver, TagObserver, TagStore, notification_queue};
use crate::worker::ReactiveEngine;
use crate::worker::fault::panic_message;

/// Re-evaluates rules and controls when one of their tags changes.
/// Holds no state between ticks beyond what the tag store carries.
pub struct ControlEngine {
    rules: RwLock<Vec<Rule>>,
    controls: RwLock<Vec<Control>>,
    tags: Arc<TagStore>,
    observer: TagObserver,
    receiver: Mutex<Option<QueueReceiver>>,
}

impl ControlEngine {
    pub fn new(tags: Arc<TagStore>) -> Self {
        let (observer, receiver) = notification_queue();
        Self {
            rules: RwLock::new(Vec::new()),
            controls: RwLock::new(Vec::new()),
            tags,
            observer,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub async fn append_rule(&self, rule: Rule) {
        info!(rule = %rule.name(), tags = rule.tags().len(), "Rule loaded");
        self.rules.write().await.push(rule);
    }

    pub async fn append_control(&self, control: Control) {
        info!(control = %control.name(), tag = %control.tag(), target = %control.target(), "Control loaded");
        self.controls.write().await.push(control);
    }

    pub async fn rule_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for rule in self.rules.read().await.iter() {
            for tag in rule.tags() {
                push_unique(&mut tags, tag.to_string());
            }
        }
        tags
    }

    pub async fn control_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for control in self.controls.read().await.iter() {
            push_unique(&mut tags, control.tag().to_string());
        }
        tags
    }

    /// Subscribes every rule and control to its tags. Control targets must
    /// exist as well.
    pub async fn attach_all(&self) -> Result<()> {
        for control in self.controls.read().await.iter() {
            if !self.tags.contains(control.target().as_str()) {
                return Err(DomainError::TagNotFound(control.target().to_string()));
            }
        }

        let mut tags = self.rule_tags().await;
        for tag in self.control_tags().await {
            push_unique(&mut tags, tag);
        }
        for tag in tags {
            self.tags.attach(&tag, self.observer.clone())?;
        }
        Ok(())
    }

    pub async fn execute(&self, tag: &str) {
        let value = match self.tags.read(tag) {
            Ok(value) => value,
            Err(e) => {
                debug!(tag = %tag, error = %e, "Control tick on unreadable tag");
                return;
            }
        };

        for rule in self.rules.read().await.iter().filter(|r| r.is_bound_to(tag)) {
            match catch_unwind(AssertUnwindSafe(|| rule.evaluate(&self.tags, &value))) {
                Ok(Ok(true)) => debug!(rule = %rule.name(), tag = %tag, "Rule fired"),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => error!(rule = %rule.name(), tag = %tag, error = %e, "Rule failed"),
                Err(panic) => {
                    error!(rule = %rule.name(), tag = %tag, error = %panic_message(&*panic), "Rule panicked")
                }
            }
        }

        for control in self
            .controls
            .read()
            .await
            .iter()
            .filter(|c| c.tag().as_str() == tag)
        {
            match catch_unwind(AssertUnwindSafe(|| control.evaluate(&self.tags, &value))) {
                Ok(Ok(true)) => debug!(control = %control.name(), target = %control.target(), "Control fired"),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => {
                    error!(control = %control.name(), tag = %tag, error = %e, "Control failed")
                }
                Err(panic) => {
                    error!(control = %control.name(), tag = %tag, error = %panic_message(&*panic), "Control panicked")
                }
            }
        }
    }

    pub fn take_receiver(&self) -> Option<QueueReceiver> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

#[async_trait]
impl ReactiveEngine for ControlEngine {
    fn kind(&self) -> &'static str {
        "control"
    }

    async fn bound_tags(&self) -> Vec<String> {
        let mut tags = self.rule_tags().await;
        for tag in self.control_tags().await {
            push_unique(&mut tags, tag);
        }
        tags
    }

    async fn execute(&self, tag: &str) {
        ControlEngine::execute(self, tag).await
    }

    fn take_receiver(&self) -> Option<QueueReceiver> {
        ControlEngine::take_receiver(self)
    }
}

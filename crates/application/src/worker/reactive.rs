use async_trait::async_trait;
use futures::FutureExt;
use infrastructure::config::DrainPolicy;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fault::panic_message;
use crate::tag::{Pop, QueueReceiver};

/// An engine driven by tag change notifications.
#[async_trait]
pub trait ReactiveEngine: Send + Sync {
    /// Short label used in logs ("alarm", "control").
    fn kind(&self) -> &'static str;

    async fn bound_tags(&self) -> Vec<String>;

    async fn execute(&self, tag: &str);

    /// Hands out the consumer side of the engine queue. Only the first call
    /// returns `Some`.
    fn take_receiver(&self) -> Option<QueueReceiver>;
}

/// Consumes an engine queue and runs the engine for each changed tag.
pub struct ReactiveWorker {
    engine: Arc<dyn ReactiveEngine>,
    period: Duration,
    policy: DrainPolicy,
}

impl ReactiveWorker {
    pub fn new(engine: Arc<dyn ReactiveEngine>, period: Duration, policy: DrainPolicy) -> Self {
        Self {
            engine,
            period,
            policy,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let kind = self.engine.kind();

        if self.engine.bound_tags().await.is_empty() {
            info!(engine = kind, "No bound tags, reactive worker not started");
            return;
        }

        let Some(mut queue) = self.engine.take_receiver() else {
            warn!(engine = kind, "Notification queue already consumed");
            return;
        };

        info!(
            engine = kind,
            period_ms = self.period.as_millis() as u64,
            policy = ?self.policy,
            "Reactive worker started"
        );

        loop {
            let pop = tokio::select! {
                _ = cancel.cancelled() => break,
                pop = queue.pop_timeout(self.period) => pop,
            };

            match pop {
                Pop::Item(change) => {
                    self.dispatch(&change.tag).await;

                    match self.policy {
                        DrainPolicy::All => {
                            let mut drained = 0usize;
                            while let Some(change) = queue.try_pop() {
                                self.dispatch(&change.tag).await;
                                drained += 1;
                            }
                            if drained > 0 {
                                debug!(engine = kind, drained, "Drained queued changes");
                            }
                        }
                        DrainPolicy::One => {
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(self.period) => {}
                            }
                        }
                    }
                }
                Pop::Empty => {}
                Pop::Closed => {
                    warn!(engine = kind, "Notification queue closed");
                    break;
                }
            }
        }

        info!(engine = kind, "Reactive worker stopped");
    }

    /// A panicking engine pass is logged and the worker moves to the next change.
    async fn dispatch(&self, tag: &str) {
        if let Err(panic) = AssertUnwindSafe(self.engine.execute(tag)).catch_unwind().await {
            error!(
                engine = self.engine.kind(),
                tag,
                error = %panic_message(&*panic),
                "Engine pass panicked"
            );
        }
    }
}

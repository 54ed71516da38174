use domain::TagChange;
use std::time::Duration;
use tokio::sync::mpsc;

/// Producer side of a notification queue, registered on tags.
///
/// Sending never blocks: the queue is unbounded, a slow consumer grows
/// memory instead of stalling tag writers.
#[derive(Debug, Clone)]
pub struct TagObserver {
    tx: mpsc::UnboundedSender<TagChange>,
}

impl TagObserver {
    /// Returns false once the consumer side is gone.
    pub fn notify(&self, change: TagChange) -> bool {
        self.tx.send(change).is_ok()
    }

    /// Two observers are equal when they feed the same queue.
    pub fn same_queue(&self, other: &TagObserver) -> bool {
        self.tx.same_channel(&other.tx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Result of a timed pop
#[derive(Debug, PartialEq)]
pub enum Pop {
    Item(TagChange),
    /// Nothing arrived before the timeout
    Empty,
    /// Every producer is gone
    Closed,
}

/// Consumer side of a notification queue. Not clonable: one consumer per queue.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<TagChange>,
}

impl QueueReceiver {
    /// Waits up to `timeout` for the next change.
    pub async fn pop_timeout(&mut self, timeout: Duration) -> Pop {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(change)) => Pop::Item(change),
            Ok(None) => Pop::Closed,
            Err(_) => Pop::Empty,
        }
    }

    /// Non-blocking pop of an already queued change.
    pub fn try_pop(&mut self) -> Option<TagChange> {
        self.rx.try_recv().ok()
    }
}

/// Creates a new queue. The observer half goes to the tag store, the
/// receiver half to the single worker that consumes it.
pub fn notification_queue() -> (TagObserver, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TagObserver { tx }, QueueReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_pop_in_send_order() {
        let (observer, mut queue) = notification_queue();
        for i in 0..3 {
            assert!(observer.notify(TagChange::new("level", json!(i), Utc::now())));
        }

        for i in 0..3 {
            match queue.pop_timeout(Duration::from_millis(10)).await {
                Pop::Item(change) => assert_eq!(change.value, json!(i)),
                other => panic!("unexpected pop: {:?}", other),
            }
        }
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).await, Pop::Empty);
    }

    #[tokio::test]
    async fn test_closed_when_producers_dropped() {
        let (observer, mut queue) = notification_queue();
        drop(observer);
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).await, Pop::Closed);
    }

    #[test]
    fn test_same_queue() {
        let (a, _qa) = notification_queue();
        let (b, _qb) = notification_queue();
        assert!(a.same_queue(&a.clone()));
        assert!(!a.same_queue(&b));
    }

    #[test]
    fn test_notify_fails_after_receiver_dropped() {
        let (observer, queue) = notification_queue();
        drop(queue);
        assert!(observer.is_closed());
        assert!(!observer.notify(TagChange::new("level", json!(1), Utc::now())));
    }
}

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use super::Event;

const CHANNEL_CAPACITY: usize = 1024;

/// In-process publish/subscribe channel for store events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<Event>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Event>> {
        self.tx.subscribe()
    }

    /// Returns the number of subscribers reached; zero is not an error.
    pub fn publish(&self, event: impl Into<Event>) -> usize {
        let event = Arc::new(event.into());
        trace!(kind = ?event.kind(), action = ?event.action(), "publishing event");
        self.tx.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ActionType, MessageEvent};

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(MessageEvent::of(ActionType::Update)), 1);

        let received = rx.recv().await.unwrap();
        assert!(received.matches(&Event::from(MessageEvent::of(ActionType::Update))));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(MessageEvent::of(ActionType::Create)), 0);
    }
}

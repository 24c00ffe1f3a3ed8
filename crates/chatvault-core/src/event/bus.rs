//! Broadcast event bus for distributing `StoreEvent` to listeners.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.

use chatvault_types::event::StoreEvent;
use tokio::sync::broadcast;

/// Default channel capacity; store events are rare.
pub const DEFAULT_CAPACITY: usize = 64;

/// Multi-consumer bus for store events.
///
/// Cloning the bus clones the sender, so the store and its owner can both
/// publish while any number of listeners subscribe.
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(StoreEvent::Cleared);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, StoreEvent::Cleared);
    }

    #[tokio::test]
    async fn cloned_bus_reaches_same_subscribers() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.clone().publish(StoreEvent::DestructiveReset {
            from_version: Some(1),
            to_version: 2,
        });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            StoreEvent::DestructiveReset { to_version: 2, .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            StoreEvent::DestructiveReset { to_version: 2, .. }
        ));
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.publish(StoreEvent::Cleared);
        bus.publish(StoreEvent::Pruned {
            threshold: 0,
            deleted: 0,
        });
    }
}

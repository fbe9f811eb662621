//! In-process event bus backed by a tokio broadcast channel.
//!
//! Publishing is synchronous so the dispatcher and the state store can emit
//! from inside command handlers; subscribers consume asynchronously. A
//! subscriber falling more than `capacity` events behind receives
//! [`broadcast::error::RecvError::Lagged`] and should resynchronise from a
//! snapshot.

use tokio::sync::broadcast;

use devlink_domain::error::DevlinkError;
use devlink_domain::event::Event;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<Event>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: Event) -> Result<(), DevlinkError> {
        let event_type = event.event_type;
        // broadcast::send fails only when there are zero receivers.
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(%event_type, receivers, "event published"),
            Err(_) => tracing::trace!(%event_type, "no subscriber, event dropped"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_domain::event::EventType;
    use devlink_domain::id::CommandId;

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let event = Event::new(
            EventType::CommandQueued,
            Some(CommandId::new()),
            serde_json::json!({"state": "queued"}),
        );
        let event_id = event.id;

        bus.publish(event).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event_id);
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();

        let event = Event::new(EventType::StateChanged, None, serde_json::json!({}));
        let event_id = event.id;

        bus.publish(event).unwrap();

        let r1 = rx1.recv().await.unwrap();
        let r2 = rx2.recv().await.unwrap();
        assert_eq!(r1.id, event_id);
        assert_eq!(r2.id, event_id);
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        let event = Event::new(EventType::StateChanged, None, serde_json::json!({}));
        assert!(bus.publish(event).is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);

        let event = Event::new(EventType::StateChanged, None, serde_json::json!({}));
        bus.publish(event).unwrap();

        let mut rx = bus.subscribe();

        let later = Event::new(EventType::CommandCompleted, None, serde_json::json!({}));
        let later_id = later.id;
        bus.publish(later).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, later_id);
    }

    #[tokio::test]
    async fn should_report_lag_when_subscriber_falls_behind() {
        let bus = InProcessEventBus::new(2);
        let mut rx = bus.subscribe();

        for _ in 0..3 {
            let event = Event::new(EventType::StateChanged, None, serde_json::json!({}));
            bus.publish(event).unwrap();
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert!(rx.recv().await.is_ok());
    }
}

//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use thiefwatch_domain::error::WatchError;
use thiefwatch_domain::event::DirectoryEvent;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
pub struct InProcessEventBus {
    sender: broadcast::Sender<DirectoryEvent>,
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
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(
        &self,
        event: DirectoryEvent,
    ) -> impl Future<Output = Result<(), WatchError>> + Send {
        // send only fails when nobody listens
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiefwatch_domain::id::DeviceId;

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DirectoryEvent::removed(DeviceId::new("10101")))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.device_id().as_str(), "10101");
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DirectoryEvent::removed(DeviceId::new("7")))
            .await
            .unwrap();

        assert_eq!(rx1.recv().await.unwrap().device_id().as_str(), "7");
        assert_eq!(rx2.recv().await.unwrap().device_id().as_str(), "7");
    }

    #[tokio::test]
    async fn should_report_lag_then_resume_with_newest_events() {
        let bus = InProcessEventBus::new(2);
        let mut rx = bus.subscribe();

        for id in ["1", "2", "3"] {
            bus.publish(DirectoryEvent::removed(DeviceId::new(id)))
                .await
                .unwrap();
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().device_id().as_str(), "2");
        assert_eq!(rx.recv().await.unwrap().device_id().as_str(), "3");
    }

    #[tokio::test]
    async fn should_close_receivers_when_bus_dropped() {
        let bus = InProcessEventBus::new(4);
        let mut rx = bus.subscribe();
        drop(bus);

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        let result = bus
            .publish(DirectoryEvent::removed(DeviceId::new("7")))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(DirectoryEvent::removed(DeviceId::new("early")))
            .await
            .unwrap();

        let mut rx = bus.subscribe();
        bus.publish(DirectoryEvent::removed(DeviceId::new("late")))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().device_id().as_str(), "late");
    }
}

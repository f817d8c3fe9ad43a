//! Transport port: the publish/subscribe bus sensors and actuators talk on.
//!
//! Delivery is at-least-once with no ordering across topics. Implementations
//! must not block inbound processing on outbound calls.

use std::future::Future;

use thiefwatch_domain::error::WatchError;

/// Outbound side of the bus.
pub trait Transport {
    /// Publish `payload` on `topic`.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), WatchError>> + Send;

    /// Start receiving messages matching `filter`.
    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), WatchError>> + Send;

    /// Stop receiving messages matching `filter`.
    fn unsubscribe(&self, filter: &str) -> impl Future<Output = Result<(), WatchError>> + Send;
}

impl<T: Transport + Send + Sync> Transport for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), WatchError>> + Send {
        (**self).publish(topic, payload)
    }

    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), WatchError>> + Send {
        (**self).subscribe(filter)
    }

    fn unsubscribe(&self, filter: &str) -> impl Future<Output = Result<(), WatchError>> + Send {
        (**self).unsubscribe(filter)
    }
}

/// Inbound side of the bus: called by the transport adapter.
///
/// Each call runs in its own task, so implementations may be invoked
/// concurrently.
pub trait MessageHandler: Send + Sync {
    /// Handle one delivered message. Failures are the handler's to log.
    fn handle_message(&self, topic: &str, payload: &[u8]) -> impl Future<Output = ()> + Send;

    /// The transport (re)established its session; subscriptions may be gone.
    fn handle_connected(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl<T: MessageHandler> MessageHandler for std::sync::Arc<T> {
    fn handle_message(&self, topic: &str, payload: &[u8]) -> impl Future<Output = ()> + Send {
        (**self).handle_message(topic, payload)
    }

    fn handle_connected(&self) -> impl Future<Output = ()> + Send {
        (**self).handle_connected()
    }
}

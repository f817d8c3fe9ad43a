//! Event bus port: publish/subscribe for directory events.

use std::future::Future;

use thiefwatch_domain::error::WatchError;
use thiefwatch_domain::event::DirectoryEvent;

/// Publishes directory events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: DirectoryEvent)
    -> impl Future<Output = Result<(), WatchError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        event: DirectoryEvent,
    ) -> impl Future<Output = Result<(), WatchError>> + Send {
        (**self).publish(event)
    }
}

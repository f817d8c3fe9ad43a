//! Inbound router: what the transport calls for every delivered message.

use std::future::Future;
use std::sync::Arc;

use thiefwatch_domain::time;

use crate::ports::{CommandSink, DirectoryRepository, EventPublisher, MessageHandler, Transport};
use crate::services::correlation_engine::CorrelationEngine;
use crate::services::subscription_manager::SubscriptionManager;

/// Routes sensor messages to the engine and restores subscriptions after
/// the transport reconnects.
pub struct InboundRouter<S, T, R, P> {
    engine: Arc<CorrelationEngine<S>>,
    subscriptions: Arc<SubscriptionManager<T, R, P>>,
}

impl<S, T, R, P> InboundRouter<S, T, R, P> {
    pub fn new(
        engine: Arc<CorrelationEngine<S>>,
        subscriptions: Arc<SubscriptionManager<T, R, P>>,
    ) -> Self {
        Self {
            engine,
            subscriptions,
        }
    }
}

impl<S, T, R, P> MessageHandler for InboundRouter<S, T, R, P>
where
    S: CommandSink,
    T: Transport + Send + Sync,
    R: DirectoryRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    fn handle_message(&self, topic: &str, payload: &[u8]) -> impl Future<Output = ()> + Send {
        async move {
            if let Err(err) = self.engine.process_message(topic, payload, time::now()).await {
                tracing::warn!(topic, error = %err, "dropping inbound message");
            }
        }
    }

    fn handle_connected(&self) -> impl Future<Output = ()> + Send {
        async move {
            self.subscriptions.invalidate().await;
            let report = self.subscriptions.refresh().await;
            tracing::info!(active = report.active, failed = report.failed, "subscriptions restored");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::services::directory_service::DirectoryService;
    use crate::testing::{InMemoryDirectoryRepo, RecordingSink, RecordingTransport, seeded_directory};
    use thiefwatch_domain::decision::{Command, LightingPolicy};
    use thiefwatch_domain::location::Location;

    async fn router() -> (
        InboundRouter<
            Arc<RecordingSink>,
            Arc<RecordingTransport>,
            Arc<InMemoryDirectoryRepo>,
            Arc<InProcessEventBus>,
        >,
        Arc<RecordingSink>,
        Arc<RecordingTransport>,
    ) {
        let repo = Arc::new(InMemoryDirectoryRepo::with(seeded_directory()));
        let directory = Arc::new(
            DirectoryService::open(repo, Arc::new(InProcessEventBus::new(4)), "td")
                .await
                .unwrap(),
        );
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(RecordingSink::default());
        let engine = Arc::new(CorrelationEngine::new(Arc::clone(&sink), LightingPolicy::default()));
        let subscriptions = Arc::new(SubscriptionManager::new(Arc::clone(&transport), directory, true));
        (InboundRouter::new(engine, subscriptions), sink, transport)
    }

    #[tokio::test]
    async fn should_route_sensor_message_to_engine() {
        let (router, sink, _) = router().await;
        let payload = serde_json::to_vec(&json!({
            "bn": "td/sensors/1/1/1/motion_sensor",
            "e": [{"n": "motion", "u": "detection", "t": 1_700_000_000, "v": "Detected"}]
        }))
        .unwrap();

        router
            .handle_message("td/sensors/1/1/1/motion_sensor", &payload)
            .await;

        assert_eq!(sink.sent(), vec![(Location::of("1", "1", "1"), Command::TurnOn)]);
    }

    #[tokio::test]
    async fn should_drop_malformed_message_quietly() {
        let (router, sink, _) = router().await;

        router.handle_message("td/sensors/1/1/1/motion_sensor", b"{}").await;
        router.handle_message("td/unknown", b"{}").await;

        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn should_resubscribe_on_every_connect() {
        let (router, _, transport) = router().await;

        router.handle_connected().await;
        router.handle_connected().await;

        assert_eq!(transport.subscribed.lock().unwrap().len(), 4);
    }
}

//! Shared application state for axum handlers.

use std::sync::Arc;

use serde::Serialize;

use thiefwatch_app::ports::{CommandSink, DirectoryRepository, EventPublisher};
use thiefwatch_app::services::correlation_engine::CorrelationEngine;
use thiefwatch_app::services::directory_service::DirectoryService;

/// Broker address handed out to device connectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerInfo {
    #[serde(rename = "IP")]
    pub host: String,
    pub port: u16,
}

/// Application state shared across all axum handlers.
///
/// Generic over the directory repository, the event publisher and the
/// engine's command sink to avoid dynamic dispatch. `Clone` is implemented
/// manually so only the `Arc` wrappers need to be cloned.
pub struct AppState<R, P, S> {
    /// Device directory.
    pub directory: Arc<DirectoryService<R, P>>,
    /// Per-location lighting decisions.
    pub engine: Arc<CorrelationEngine<S>>,
    /// Broker the controller is connected to, when advertised.
    pub broker: Option<Arc<BrokerInfo>>,
}

impl<R, P, S> Clone for AppState<R, P, S> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            engine: Arc::clone(&self.engine),
            broker: self.broker.clone(),
        }
    }
}

impl<R, P, S> AppState<R, P, S>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    /// Create a new application state from service instances.
    pub fn new(directory: DirectoryService<R, P>, engine: CorrelationEngine<S>) -> Self {
        Self {
            directory: Arc::new(directory),
            engine: Arc::new(engine),
            broker: None,
        }
    }

    /// Create a new application state from services already shared with
    /// background tasks.
    pub fn from_arcs(
        directory: Arc<DirectoryService<R, P>>,
        engine: Arc<CorrelationEngine<S>>,
    ) -> Self {
        Self {
            directory,
            engine,
            broker: None,
        }
    }

    /// Advertise `broker` on `GET /api/broker`.
    #[must_use]
    pub fn with_broker(mut self, broker: BrokerInfo) -> Self {
        self.broker = Some(Arc::new(broker));
        self
    }
}

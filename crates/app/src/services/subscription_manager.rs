//! Subscription manager: keeps the transport subscribed to the sensor
//! streams of every location in the directory.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use thiefwatch_domain::error::WatchError;
use thiefwatch_domain::topic;

use crate::periodic::PeriodicJob;
use crate::ports::{DirectoryRepository, EventPublisher, Transport};
use crate::services::directory_service::DirectoryService;

/// Counters of one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub subscribed: usize,
    pub unsubscribed: usize,
    pub failed: usize,
    pub active: usize,
}

impl RefreshReport {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.subscribed > 0 || self.unsubscribed > 0 || self.failed > 0
    }
}

/// Namespaces sensors may publish under: the configured one and its
/// lower-cased spelling.
#[must_use]
pub fn sensor_namespaces(namespace: &str) -> Vec<String> {
    let lower = namespace.to_lowercase();
    if lower == namespace {
        vec![lower]
    } else {
        vec![namespace.to_owned(), lower]
    }
}

pub struct SubscriptionManager<T, R, P> {
    transport: T,
    directory: Arc<DirectoryService<R, P>>,
    unsubscribe_removed: bool,
    active: Mutex<BTreeSet<String>>,
}

impl<T, R, P> SubscriptionManager<T, R, P>
where
    T: Transport + Send + Sync,
    R: DirectoryRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(transport: T, directory: Arc<DirectoryService<R, P>>, unsubscribe_removed: bool) -> Self {
        Self {
            transport,
            directory,
            unsubscribe_removed,
            active: Mutex::new(BTreeSet::new()),
        }
    }

    /// Filters the directory currently calls for.
    pub async fn desired_filters(&self) -> BTreeSet<String> {
        let namespaces = sensor_namespaces(&self.directory.namespace().await);
        self.directory
            .list_locations()
            .await
            .iter()
            .flat_map(|location| {
                namespaces
                    .iter()
                    .map(move |ns| topic::sensor_filter(ns, location))
            })
            .collect()
    }

    /// Filters the transport is known to be subscribed to.
    pub async fn active_filters(&self) -> Vec<String> {
        self.active.lock().await.iter().cloned().collect()
    }

    /// Forget the active set, so the next refresh subscribes everything again.
    pub async fn invalidate(&self) {
        self.active.lock().await.clear();
    }

    /// Diff the desired filters against the active set and converge.
    ///
    /// Individual failures are logged and retried on the next refresh.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshReport {
        let desired = self.desired_filters().await;
        let mut active = self.active.lock().await;
        let mut report = RefreshReport::default();

        if desired.is_empty() {
            tracing::debug!("directory has no locations yet");
        }

        let additions: Vec<String> = desired.difference(&active).cloned().collect();
        for filter in additions {
            match self.transport.subscribe(&filter).await {
                Ok(()) => {
                    tracing::debug!(filter = %filter, "subscribed");
                    active.insert(filter);
                    report.subscribed += 1;
                }
                Err(err) => {
                    tracing::warn!(filter = %filter, error = %err, "subscribe failed");
                    report.failed += 1;
                }
            }
        }

        if self.unsubscribe_removed {
            let removals: Vec<String> = active.difference(&desired).cloned().collect();
            for filter in removals {
                match self.transport.unsubscribe(&filter).await {
                    Ok(()) => {
                        tracing::debug!(filter = %filter, "unsubscribed");
                        active.remove(&filter);
                        report.unsubscribed += 1;
                    }
                    Err(err) => {
                        tracing::warn!(filter = %filter, error = %err, "unsubscribe failed");
                        report.failed += 1;
                    }
                }
            }
        }

        report.active = active.len();
        if report.changed() {
            tracing::info!(
                subscribed = report.subscribed,
                unsubscribed = report.unsubscribed,
                failed = report.failed,
                active = report.active,
                "subscriptions refreshed"
            );
        }
        report
    }
}

impl<T, R, P> PeriodicJob for SubscriptionManager<T, R, P>
where
    T: Transport + Send + Sync + 'static,
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "subscription-refresh"
    }

    fn run(&self) -> impl Future<Output = Result<(), WatchError>> + Send {
        async move {
            self.refresh().await;
            Ok(())
        }
    }
}

//! Staleness reaper: evicts devices that stopped reporting.

use std::future::Future;
use std::sync::Arc;

use chrono::TimeDelta;

use thiefwatch_domain::error::WatchError;
use thiefwatch_domain::time::{self, Timestamp};

use crate::periodic::PeriodicJob;
use crate::ports::{DirectoryRepository, EventPublisher};
use crate::services::directory_service::DirectoryService;

pub struct StalenessReaper<R, P> {
    directory: Arc<DirectoryService<R, P>>,
    retention: TimeDelta,
}

impl<R, P> StalenessReaper<R, P>
where
    R: DirectoryRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(directory: Arc<DirectoryService<R, P>>, retention: TimeDelta) -> Self {
        Self {
            directory,
            retention,
        }
    }

    /// Remove every device older than the retention window at `now`.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the pruned directory cannot be saved.
    pub async fn reap(&self, now: Timestamp) -> Result<usize, WatchError> {
        let removed = self.directory.prune_stale(self.retention, now).await?;
        if removed.is_empty() {
            tracing::debug!("no stale devices");
        } else {
            let ids: Vec<&str> = removed.iter().map(|d| d.device_id.as_str()).collect();
            tracing::info!(count = removed.len(), devices = ?ids, "removed stale devices");
        }
        Ok(removed.len())
    }
}

impl<R, P> PeriodicJob for StalenessReaper<R, P>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "staleness-reaper"
    }

    fn run(&self) -> impl Future<Output = Result<(), WatchError>> + Send {
        async move { self.reap(time::now()).await.map(|_| ()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::testing::{InMemoryDirectoryRepo, at, light_switch, seeded_directory};
    use thiefwatch_domain::location::Location;

    #[tokio::test]
    async fn should_reap_stale_devices_idempotently() {
        let mut dir = seeded_directory();
        dir.upsert_device(light_switch("10102", Location::of("1", "1", "2")), at(3000))
            .unwrap();
        let repo = Arc::new(InMemoryDirectoryRepo::with(dir));
        let service = Arc::new(
            DirectoryService::open(repo, Arc::new(InProcessEventBus::new(4)), "td")
                .await
                .unwrap(),
        );
        let reaper = StalenessReaper::new(Arc::clone(&service), TimeDelta::hours(1));

        assert_eq!(reaper.reap(at(3601)).await.unwrap(), 2);
        assert_eq!(reaper.reap(at(3601)).await.unwrap(), 0);
        assert_eq!(service.list_devices().await.len(), 1);
    }
}

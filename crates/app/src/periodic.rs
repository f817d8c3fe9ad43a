//! Periodic jobs: run, log, sleep, repeat.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use thiefwatch_domain::error::WatchError;

/// A unit of background work executed on a fixed period.
pub trait PeriodicJob: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run one cycle.
    fn run(&self) -> impl Future<Output = Result<(), WatchError>> + Send;
}

/// Spawn `job` so it runs every `period`, first after one full period.
///
/// Each cycle runs in its own task: an error or a panic is logged and the
/// job re-arms. Aborting the returned handle stops re-arming.
pub fn spawn<J: PeriodicJob>(job: Arc<J>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(job = job.name(), period_secs = period.as_secs(), "periodic job armed");
        loop {
            tokio::time::sleep(period).await;
            run_once(&job).await;
        }
    })
}

/// Run a single isolated cycle of `job`.
pub async fn run_once<J: PeriodicJob>(job: &Arc<J>) {
    let cycle = Arc::clone(job);
    match tokio::spawn(async move { cycle.run().await }).await {
        Ok(Ok(())) => tracing::debug!(job = job.name(), "periodic job completed"),
        Ok(Err(err)) => tracing::warn!(job = job.name(), error = %err, "periodic job failed"),
        Err(err) => tracing::error!(job = job.name(), error = %err, "periodic job panicked"),
    }
}

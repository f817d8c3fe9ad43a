//! Command dispatcher: publishes actuator commands and mirrors the
//! resulting status into the directory.
//!
//! Every dispatch publishes exactly once. Directory writes go through a
//! per-device cache of the last status written, so repeating a command does
//! not rewrite the directory.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use thiefwatch_domain::decision::Command;
use thiefwatch_domain::device::DeviceKind;
use thiefwatch_domain::envelope::Envelope;
use thiefwatch_domain::error::WatchError;
use thiefwatch_domain::event::DirectoryEvent;
use thiefwatch_domain::id::DeviceId;
use thiefwatch_domain::location::Location;
use thiefwatch_domain::time;
use thiefwatch_domain::topic;

use crate::ports::{CommandSink, DirectoryRepository, EventPublisher, Transport};
use crate::services::directory_service::DirectoryService;

/// Name of the actuator the lighting commands target by default.
pub const DEFAULT_ACTUATOR: &str = "light_switch";

/// What a single dispatch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub published: bool,
    pub directory_writes: usize,
}

pub struct CommandDispatcher<T, R, P> {
    transport: T,
    directory: Arc<DirectoryService<R, P>>,
    actuator_name: String,
    last_status: Mutex<HashMap<DeviceId, String>>,
}

impl<T, R, P> CommandDispatcher<T, R, P>
where
    T: Transport + Send + Sync,
    R: DirectoryRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(
        transport: T,
        directory: Arc<DirectoryService<R, P>>,
        actuator_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            directory,
            actuator_name: actuator_name.into(),
            last_status: Mutex::new(HashMap::new()),
        }
    }

    /// Publish `command` to `target` at `location`, then write the new status
    /// into every matching actuator whose cached status differs.
    ///
    /// Publish and writes are independent: a failure of one is logged and
    /// does not undo the other.
    #[tracing::instrument(skip(self), fields(location = %location, command = %command))]
    pub async fn dispatch(
        &self,
        location: &Location,
        target: &str,
        command: Command,
    ) -> DispatchOutcome {
        let namespace = self.directory.namespace().await;
        let topic = topic::command_topic(&namespace, location, target);
        let published = self.publish(&topic, command).await;

        let status = command.status();
        let mut directory_writes = 0;
        let actuators = self
            .directory
            .list_devices()
            .await
            .into_iter()
            .filter(|d| d.is_actuator_named(location, target));
        for device in actuators {
            {
                let mut cache = self.last_status.lock().await;
                if cache.get(&device.device_id).map(String::as_str) == Some(status) {
                    tracing::debug!(device_id = %device.device_id, status, "status unchanged, write suppressed");
                    continue;
                }
                cache.insert(device.device_id.clone(), status.to_owned());
            }
            match self.directory.update_status(&device.device_id, status).await {
                Ok(_) => directory_writes += 1,
                Err(err) => tracing::warn!(
                    device_id = %device.device_id,
                    error = %err,
                    "failed to mirror actuator status"
                ),
            }
        }

        DispatchOutcome {
            published,
            directory_writes,
        }
    }

    async fn publish(&self, topic: &str, command: Command) -> bool {
        let payload = match Envelope::command(topic, command, time::now()).to_vec() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode command");
                return false;
            }
        };
        match self.transport.publish(topic, payload).await {
            Ok(()) => {
                tracing::info!(topic, "command published");
                true
            }
            Err(err) => {
                tracing::warn!(topic, error = %err, "failed to publish command");
                false
            }
        }
    }

    /// Keep the status cache in line with the directory.
    pub async fn observe(&self, event: &DirectoryEvent) {
        let mut cache = self.last_status.lock().await;
        match event {
            DirectoryEvent::DeviceRemoved { device_id } => {
                cache.remove(device_id);
            }
            DirectoryEvent::DeviceUpserted {
                device_id,
                kind: DeviceKind::Actuator,
                status,
                ..
            } => {
                cache.insert(device_id.clone(), status.clone());
            }
            DirectoryEvent::DeviceUpserted { .. } => {}
        }
    }

    /// Forget every cached status (at worst one redundant write per device).
    pub async fn clear_cache(&self) {
        self.last_status.lock().await.clear();
    }

    /// Last status written for `device_id`, if cached.
    pub async fn cached_status(&self, device_id: &DeviceId) -> Option<String> {
        self.last_status.lock().await.get(device_id).cloned()
    }
}

impl<T, R, P> CommandDispatcher<T, R, P>
where
    T: Transport + Send + Sync + 'static,
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Follow directory events until the bus closes.
    ///
    /// A lagging receiver lost events, so the whole cache is dropped.
    pub fn follow(self: Arc<Self>, mut events: broadcast::Receiver<DirectoryEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.observe(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "directory events lagged, clearing status cache");
                        self.clear_cache().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl<T, R, P> CommandSink for CommandDispatcher<T, R, P>
where
    T: Transport + Send + Sync,
    R: DirectoryRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    fn send(
        &self,
        location: &Location,
        command: Command,
    ) -> impl Future<Output = Result<(), WatchError>> + Send {
        async move {
            self.dispatch(location, &self.actuator_name, command).await;
            Ok(())
        }
    }
}

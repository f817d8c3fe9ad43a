//! Directory service: validated, persisted writes to the device directory.
//!
//! The tree lives in memory behind an `Arc` snapshot. Writes are serialized
//! by a single writer lock: the current tree is cloned, the clone mutated and
//! persisted, and only then swapped in. Readers always get a complete tree.
//! Directory events are published before the writer lock is released, so
//! subscribers see them in storage order.

use std::sync::Arc;

use chrono::TimeDelta;
use tokio::sync::{Mutex, RwLock};

use thiefwatch_domain::device::DeviceRecord;
use thiefwatch_domain::directory::{Directory, Site, SiteRecord, Unit, UpsertOutcome};
use thiefwatch_domain::error::{NotFoundError, WatchError};
use thiefwatch_domain::event::DirectoryEvent;
use thiefwatch_domain::id::{DeviceId, SiteId};
use thiefwatch_domain::location::Location;
use thiefwatch_domain::time::{self, Timestamp};

use crate::ports::{DirectoryRepository, EventPublisher};

/// Application service owning the device directory.
pub struct DirectoryService<R, P> {
    repo: R,
    publisher: P,
    current: RwLock<Arc<Directory>>,
    writer: Mutex<()>,
}

impl<R, P> DirectoryService<R, P>
where
    R: DirectoryRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    /// Load the last snapshot (or start empty under `namespace`) and repair it.
    ///
    /// A snapshot that needed repairs is persisted once.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the snapshot cannot be read, or when a
    /// repaired snapshot cannot be written back.
    #[tracing::instrument(skip(repo, publisher))]
    pub async fn open(repo: R, publisher: P, namespace: &str) -> Result<Self, WatchError> {
        let directory = match repo.load().await? {
            Some(mut directory) => {
                if directory.namespace != namespace {
                    tracing::warn!(
                        stored = %directory.namespace,
                        "snapshot namespace differs from configuration, keeping the stored one"
                    );
                }
                let fixes = directory.repair();
                if fixes > 0 {
                    tracing::info!(fixes, "repaired directory snapshot");
                    repo.save(&directory).await?;
                }
                directory
            }
            None => {
                tracing::info!("no directory snapshot found, starting empty");
                Directory::new(namespace)
            }
        };
        Ok(Self {
            repo,
            publisher,
            current: RwLock::new(Arc::new(directory)),
            writer: Mutex::new(()),
        })
    }

    /// The current tree.
    pub async fn snapshot(&self) -> Arc<Directory> {
        Arc::clone(&*self.current.read().await)
    }

    /// Root segment of every topic.
    pub async fn namespace(&self) -> String {
        self.snapshot().await.namespace.clone()
    }

    /// Clone, mutate, persist, swap, announce. `mutate` reports whether
    /// anything changed and pushes the events the change produces; an
    /// unchanged tree is not persisted.
    async fn write<T, F>(&self, mutate: F) -> Result<T, WatchError>
    where
        F: FnOnce(&mut Directory, &mut Vec<DirectoryEvent>) -> Result<(T, bool), WatchError>
            + Send,
        T: Send,
    {
        let _guard = self.writer.lock().await;
        let mut next = Directory::clone(&*self.snapshot().await);
        let mut events = Vec::new();
        let (out, changed) = mutate(&mut next, &mut events)?;
        if changed {
            self.repo.save(&next).await?;
            *self.current.write().await = Arc::new(next);
            for event in events {
                if let Err(err) = self.publisher.publish(event).await {
                    tracing::warn!(error = %err, "failed to publish directory event");
                }
            }
        }
        Ok(out)
    }

    /// Insert or replace a device record.
    ///
    /// Returns the stored record (with its `lastUpdate` stamp) and whether it
    /// was created or updated.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Validation`] when the record is invalid,
    /// [`WatchError::NotFound`] when its location does not exist, or a
    /// storage error. The directory is unchanged in every case.
    #[tracing::instrument(skip(self, record), fields(device_id = %record.device_id))]
    pub async fn upsert_device(
        &self,
        record: DeviceRecord,
    ) -> Result<(DeviceRecord, UpsertOutcome), WatchError> {
        record.validate()?;
        let now = time::now();
        let device_id = record.device_id.clone();
        let (stored, outcome) = self
            .write(move |dir, events| {
                let outcome = dir.upsert_device(record, now)?;
                let stored = dir
                    .device(&device_id)
                    .cloned()
                    .ok_or(NotFoundError::Device(device_id))?;
                events.push(DirectoryEvent::upserted(&stored));
                Ok(((stored, outcome), true))
            })
            .await?;
        tracing::debug!(?outcome, status = %stored.status, "device stored");
        Ok((stored, outcome))
    }

    /// Validate a raw registration payload, then upsert it.
    ///
    /// # Errors
    ///
    /// Same as [`upsert_device`](Self::upsert_device); schema violations are
    /// all reported together.
    pub async fn register_device(
        &self,
        payload: serde_json::Value,
    ) -> Result<(DeviceRecord, UpsertOutcome), WatchError> {
        let record = DeviceRecord::from_json(payload)?;
        self.upsert_device(record).await
    }

    /// Write `status` into an existing device.
    ///
    /// The record is read and patched under the writer lock, so a concurrent
    /// upsert of the same device is never overwritten with older fields.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotFound`] when the device is unknown,
    /// [`WatchError::Validation`] when `status` is rejected, or a storage
    /// error.
    #[tracing::instrument(skip(self), fields(device_id = %device_id))]
    pub async fn update_status(
        &self,
        device_id: &DeviceId,
        status: &str,
    ) -> Result<DeviceRecord, WatchError> {
        let now = time::now();
        let stored = self
            .write(|dir, events| {
                let mut record = dir
                    .device(device_id)
                    .cloned()
                    .ok_or_else(|| NotFoundError::Device(device_id.clone()))?;
                record.status = status.to_owned();
                record.validate()?;
                dir.upsert_device(record, now)?;
                let stored = dir
                    .device(device_id)
                    .cloned()
                    .ok_or_else(|| NotFoundError::Device(device_id.clone()))?;
                events.push(DirectoryEvent::upserted(&stored));
                Ok((stored, true))
            })
            .await?;
        tracing::debug!(status = %stored.status, "device status stored");
        Ok(stored)
    }

    /// Merge a location record into the tree.
    ///
    /// # Errors
    ///
    /// Returns a storage error; the directory is then unchanged.
    #[tracing::instrument(skip(self, record), fields(site_id = %record.site_id))]
    pub async fn upsert_location(&self, record: SiteRecord) -> Result<UpsertOutcome, WatchError> {
        let now = time::now();
        let outcome = self
            .write(move |dir, _| Ok((dir.upsert_site(record, now), true)))
            .await?;
        tracing::info!(?outcome, "location record stored");
        Ok(outcome)
    }

    /// Validate a raw location record, then merge it.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Validation`] listing every violation, or a
    /// storage error.
    pub async fn register_location(
        &self,
        payload: serde_json::Value,
    ) -> Result<UpsertOutcome, WatchError> {
        let record = SiteRecord::from_json(payload)?;
        self.upsert_location(record).await
    }

    /// Look up a device by id.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotFound`] when no device has this id.
    pub async fn get_device(&self, device_id: &DeviceId) -> Result<DeviceRecord, WatchError> {
        self.snapshot()
            .await
            .device(device_id)
            .cloned()
            .ok_or_else(|| NotFoundError::Device(device_id.clone()).into())
    }

    pub async fn list_devices(&self) -> Vec<DeviceRecord> {
        self.snapshot().await.devices().cloned().collect()
    }

    /// Devices stored under `location`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotFound`] when the location does not exist.
    pub async fn get_location(&self, location: &Location) -> Result<Unit, WatchError> {
        self.snapshot()
            .await
            .unit(location)
            .cloned()
            .ok_or_else(|| NotFoundError::Location(location.clone()).into())
    }

    pub async fn list_locations(&self) -> Vec<Location> {
        self.snapshot().await.locations()
    }

    /// # Errors
    ///
    /// Returns [`WatchError::NotFound`] when no site has this id.
    pub async fn get_site(&self, site_id: &SiteId) -> Result<Site, WatchError> {
        self.snapshot()
            .await
            .site(site_id)
            .cloned()
            .ok_or_else(|| NotFoundError::Site(site_id.clone()).into())
    }

    pub async fn list_sites(&self) -> Vec<Site> {
        self.snapshot().await.sites.clone()
    }

    /// Remove a device; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error; the device is then still present.
    #[tracing::instrument(skip(self))]
    pub async fn remove_device(&self, device_id: &DeviceId) -> Result<bool, WatchError> {
        let removed = self
            .write(|dir, events| {
                let removed = dir.remove_device(device_id).is_some();
                if removed {
                    events.push(DirectoryEvent::removed(device_id.clone()));
                }
                Ok((removed, removed))
            })
            .await?;
        if removed {
            tracing::info!(device_id = %device_id, "device removed");
        }
        Ok(removed)
    }

    /// Remove every device with `now - lastUpdate > retention`, persisting once.
    ///
    /// # Errors
    ///
    /// Returns a storage error; nothing is removed then.
    #[tracing::instrument(skip(self))]
    pub async fn prune_stale(
        &self,
        retention: TimeDelta,
        now: Timestamp,
    ) -> Result<Vec<DeviceRecord>, WatchError> {
        let removed = self
            .write(move |dir, events| {
                let removed = dir.prune_stale(retention, now);
                events.extend(
                    removed
                        .iter()
                        .map(|record| DirectoryEvent::removed(record.device_id.clone())),
                );
                let changed = !removed.is_empty();
                Ok((removed, changed))
            })
            .await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::testing::{
        InMemoryDirectoryRepo, at, home_site, light_switch, seeded_directory,
    };

    type Service = DirectoryService<Arc<InMemoryDirectoryRepo>, Arc<InProcessEventBus>>;

    async fn service_with(directory: Option<Directory>) -> (Service, Arc<InMemoryDirectoryRepo>) {
        let repo = Arc::new(match directory {
            Some(dir) => InMemoryDirectoryRepo::with(dir),
            None => InMemoryDirectoryRepo::default(),
        });
        let bus = Arc::new(InProcessEventBus::new(16));
        let service = DirectoryService::open(Arc::clone(&repo), bus, "td")
            .await
            .unwrap();
        (service, repo)
    }

    fn registration(id: serde_json::Value) -> serde_json::Value {
        json!({
            "deviceID": id,
            "deviceKind": "sensor",
            "deviceName": "light_sensor",
            "deviceStatus": "412",
            "availableStatuses": [],
            "deviceLocation": {"siteID": "1", "zoneID": "1", "unitID": "2"},
            "measureType": ["light"],
            "availableServices": ["MQTT"],
            "servicesDetails": [{"serviceType": "MQTT", "topic": ["td/sensors/1/1/2/light_sensor"]}]
        })
    }

    #[tokio::test]
    async fn should_start_empty_when_no_snapshot() {
        let (service, repo) = service_with(None).await;

        assert_eq!(service.namespace().await, "td");
        assert!(service.list_locations().await.is_empty());
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_persist_repaired_snapshot_once() {
        let mut dir = seeded_directory();
        let dup = light_switch("10101", Location::of("1", "1", "1"));
        dir.sites[0].zones[0].units[1].devices.push(dup);

        let (service, repo) = service_with(Some(dir)).await;

        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
        assert_eq!(service.list_devices().await.len(), 2);
    }

    #[tokio::test]
    async fn should_return_registered_device_modulo_last_update() {
        let (service, _) = service_with(Some(seeded_directory())).await;
        let record = light_switch("20101", Location::of("1", "1", "2"));

        let (stored, outcome) = service.upsert_device(record.clone()).await.unwrap();
        let fetched = service.get_device(&record.device_id).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(fetched, stored);
        assert_eq!(
            DeviceRecord {
                last_update: record.last_update,
                ..fetched
            },
            record
        );
    }

    #[tokio::test]
    async fn should_register_raw_payload_and_persist() {
        let (service, repo) = service_with(Some(seeded_directory())).await;

        let (stored, _) = service.register_device(registration(json!(20201))).await.unwrap();

        assert_eq!(stored.device_id.as_str(), "20201");
        let persisted = repo.stored().unwrap();
        assert!(persisted.device(&stored.device_id).is_some());
    }

    #[tokio::test]
    async fn should_name_device_id_and_leave_store_unchanged_when_missing() {
        let (service, repo) = service_with(Some(seeded_directory())).await;
        let before = service.snapshot().await;
        let mut payload = registration(json!(1));
        payload.as_object_mut().unwrap().remove("deviceID");

        let err = service.register_device(payload).await.unwrap_err();

        assert!(matches!(&err, WatchError::Validation(v) if v.mentions("deviceID")));
        assert_eq!(*service.snapshot().await, *before);
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_reject_unknown_location() {
        let (service, _) = service_with(Some(seeded_directory())).await;

        let err = service
            .upsert_device(light_switch("30101", Location::of("3", "1", "1")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WatchError::NotFound(NotFoundError::Location(_))
        ));
    }

    #[tokio::test]
    async fn should_keep_tree_when_persist_fails() {
        let (service, repo) = service_with(Some(seeded_directory())).await;
        repo.fail_saves.store(true, Ordering::SeqCst);

        let err = service
            .upsert_device(light_switch("20101", Location::of("1", "1", "2")))
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::Storage(_)));
        assert!(service.get_device(&DeviceId::new("20101")).await.is_err());
    }

    #[tokio::test]
    async fn should_publish_events_for_writes_and_removals() {
        let repo = Arc::new(InMemoryDirectoryRepo::with(seeded_directory()));
        let bus = Arc::new(InProcessEventBus::new(16));
        let mut rx = bus.subscribe();
        let service = DirectoryService::open(repo, Arc::clone(&bus), "td")
            .await
            .unwrap();

        service
            .update_status(&DeviceId::new("10101"), "ON")
            .await
            .unwrap();
        assert!(service.remove_device(&DeviceId::new("10101")).await.unwrap());
        assert!(!service.remove_device(&DeviceId::new("10101")).await.unwrap());

        assert!(matches!(
            rx.recv().await.unwrap(),
            DirectoryEvent::DeviceUpserted { ref status, .. } if status == "ON"
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            DirectoryEvent::removed(DeviceId::new("10101"))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_keep_concurrent_move_when_patching_status() {
        let (service, _) = service_with(Some(seeded_directory())).await;
        let service = Arc::new(service);
        let moved = Location::of("1", "1", "2");

        let mover = tokio::spawn({
            let service = Arc::clone(&service);
            let record = light_switch("10101", moved.clone());
            async move { service.upsert_device(record).await.map(|_| ()) }
        });
        let patcher = tokio::spawn({
            let service = Arc::clone(&service);
            async move {
                service
                    .update_status(&DeviceId::new("10101"), "ON")
                    .await
                    .map(|_| ())
            }
        });
        mover.await.unwrap().unwrap();
        patcher.await.unwrap().unwrap();

        let stored = service.get_device(&DeviceId::new("10101")).await.unwrap();
        assert_eq!(stored.location, moved);
        let previous = service
            .get_location(&Location::of("1", "1", "1"))
            .await
            .unwrap();
        assert!(previous.devices.iter().all(|d| d.device_id != stored.device_id));
    }

    #[tokio::test]
    async fn should_publish_events_in_storage_order() {
        let repo = Arc::new(InMemoryDirectoryRepo::with(seeded_directory()));
        let bus = Arc::new(InProcessEventBus::new(32));
        let mut rx = bus.subscribe();
        let service = Arc::new(
            DirectoryService::open(repo, Arc::clone(&bus), "td")
                .await
                .unwrap(),
        );

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let service = Arc::clone(&service);
                let status = if i % 2 == 0 { "ON" } else { "OFF" };
                tokio::spawn(async move {
                    service
                        .update_status(&DeviceId::new("10101"), status)
                        .await
                        .map(|_| ())
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            if let DirectoryEvent::DeviceUpserted { status, .. } = event {
                last = Some(status);
            }
        }
        let stored = service.get_device(&DeviceId::new("10101")).await.unwrap();
        assert_eq!(last, Some(stored.status));
    }

    #[tokio::test]
    async fn should_reject_status_patch_for_unknown_device() {
        let (service, repo) = service_with(Some(seeded_directory())).await;

        let err = service
            .update_status(&DeviceId::new("99999"), "ON")
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::NotFound(NotFoundError::Device(_))));
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_prune_stale_devices_and_skip_persist_when_nothing_removed() {
        let (service, repo) = service_with(Some(seeded_directory())).await;
        let retention = TimeDelta::hours(1);

        let removed = service.prune_stale(retention, at(3601)).await.unwrap();
        let saves = repo.saves.load(Ordering::SeqCst);
        let again = service.prune_stale(retention, at(3601)).await.unwrap();

        assert_eq!(removed.len(), 2);
        assert!(again.is_empty());
        assert_eq!(saves, 1);
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_merge_location_records() {
        let (service, _) = service_with(None).await;

        let created = service.upsert_location(home_site()).await.unwrap();
        let updated = service
            .register_location(json!({
                "siteID": "1",
                "siteName": "Home",
                "zones": [{"zoneID": "2", "units": [{"unitID": "1"}]}]
            }))
            .await
            .unwrap();

        assert_eq!(created, UpsertOutcome::Created);
        assert_eq!(updated, UpsertOutcome::Updated);
        assert_eq!(service.list_locations().await.len(), 3);
        assert!(service.get_location(&Location::of("1", "2", "1")).await.is_ok());
        assert!(service.get_site(&SiteId::new("9")).await.is_err());
    }
}

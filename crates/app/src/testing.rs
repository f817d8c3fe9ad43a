//! In-memory port implementations shared by the service tests.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use serde_json::json;

use thiefwatch_domain::decision::Command;
use thiefwatch_domain::device::{DeviceKind, DeviceRecord};
use thiefwatch_domain::directory::{Directory, SiteRecord};
use thiefwatch_domain::error::WatchError;
use thiefwatch_domain::location::Location;
use thiefwatch_domain::time::Timestamp;

use crate::ports::{CommandSink, DirectoryRepository, Transport};

pub fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Site `1` with zone `1` holding units `1` and `2`.
pub fn home_site() -> SiteRecord {
    SiteRecord::from_json(json!({
        "siteID": "1",
        "siteName": "Home",
        "zones": [{"zoneID": "1", "units": [{"unitID": "1"}, {"unitID": "2"}]}]
    }))
    .unwrap()
}

pub fn light_switch(id: &str, location: Location) -> DeviceRecord {
    DeviceRecord::builder()
        .device_id(id)
        .kind(DeviceKind::Actuator)
        .name("light_switch")
        .status("OFF")
        .available_status("ON")
        .available_status("OFF")
        .location(location)
        .measure("light")
        .build()
        .unwrap()
}

pub fn motion_sensor(id: &str, location: Location) -> DeviceRecord {
    DeviceRecord::builder()
        .device_id(id)
        .kind(DeviceKind::Sensor)
        .name("motion_sensor")
        .status("No Motion")
        .location(location)
        .measure("motion")
        .build()
        .unwrap()
}

/// The home site with one light switch and one motion sensor in `1/1/1`.
pub fn seeded_directory() -> Directory {
    let mut dir = Directory::new("td");
    dir.upsert_site(home_site(), at(0));
    dir.upsert_device(light_switch("10101", Location::of("1", "1", "1")), at(0))
        .unwrap();
    dir.upsert_device(motion_sensor("11101", Location::of("1", "1", "1")), at(0))
        .unwrap();
    dir
}

#[derive(Default)]
pub struct InMemoryDirectoryRepo {
    pub stored: Mutex<Option<Directory>>,
    pub saves: AtomicUsize,
    pub fail_saves: AtomicBool,
}

impl InMemoryDirectoryRepo {
    pub fn with(directory: Directory) -> Self {
        Self {
            stored: Mutex::new(Some(directory)),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Option<Directory> {
        self.stored.lock().unwrap().clone()
    }
}

impl DirectoryRepository for InMemoryDirectoryRepo {
    fn load(&self) -> impl Future<Output = Result<Option<Directory>, WatchError>> + Send {
        let stored = self.stored();
        async move { Ok(stored) }
    }

    fn save(&self, directory: &Directory) -> impl Future<Output = Result<(), WatchError>> + Send {
        let result = if self.fail_saves.load(Ordering::SeqCst) {
            Err(WatchError::Storage("disk full".into()))
        } else {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.stored.lock().unwrap() = Some(directory.clone());
            Ok(())
        };
        async move {
            // lets concurrent writers interleave like a real disk write
            tokio::task::yield_now().await;
            result
        }
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub published: Mutex<Vec<(String, Vec<u8>)>>,
    pub subscribed: Mutex<Vec<String>>,
    pub unsubscribed: Mutex<Vec<String>>,
    pub failing_filters: Mutex<HashSet<String>>,
    pub fail_publish: AtomicBool,
}

impl RecordingTransport {
    pub fn published_topics(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn fail_filter(&self, filter: &str) {
        self.failing_filters
            .lock()
            .unwrap()
            .insert(filter.to_owned());
    }

    pub fn heal_filter(&self, filter: &str) {
        self.failing_filters.lock().unwrap().remove(filter);
    }

    fn check(&self, filter: &str) -> Result<(), WatchError> {
        if self.failing_filters.lock().unwrap().contains(filter) {
            Err(WatchError::Transport(format!("refused {filter}").into()))
        } else {
            Ok(())
        }
    }
}

impl Transport for RecordingTransport {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), WatchError>> + Send {
        let result = if self.fail_publish.load(Ordering::SeqCst) {
            Err(WatchError::Transport("not connected".into()))
        } else {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_owned(), payload));
            Ok(())
        };
        async move { result }
    }

    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), WatchError>> + Send {
        let result = self.check(filter).map(|()| {
            self.subscribed.lock().unwrap().push(filter.to_owned());
        });
        async move { result }
    }

    fn unsubscribe(&self, filter: &str) -> impl Future<Output = Result<(), WatchError>> + Send {
        let result = self.check(filter).map(|()| {
            self.unsubscribed.lock().unwrap().push(filter.to_owned());
        });
        async move { result }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(Location, Command)>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(Location, Command)> {
        self.sent.lock().unwrap().clone()
    }
}

impl CommandSink for RecordingSink {
    fn send(
        &self,
        location: &Location,
        command: Command,
    ) -> impl Future<Output = Result<(), WatchError>> + Send {
        self.sent.lock().unwrap().push((location.clone(), command));
        async { Ok(()) }
    }
}

//! The directory tree: Site → Zone → Unit → devices.
//!
//! [`Directory`] is a plain value. Callers that share it (the directory
//! service) clone it, mutate the clone, persist it and swap it in, so every
//! method here is synchronous and infallible apart from lookups.

use std::collections::{HashMap, HashSet};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::device::DeviceRecord;
use crate::error::{NotFoundError, Problem, ValidationError};
use crate::id::{DeviceId, SiteId, UnitId, ZoneId};
use crate::location::Location;
use crate::schema;
use crate::time::Timestamp;

/// Whether a write created a new entry or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Root of the tree, as persisted in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    /// Root segment of every topic.
    pub namespace: String,
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub last_update: Option<Timestamp>,
}

/// A building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(rename = "siteID")]
    pub site_id: SiteId,
    #[serde(rename = "siteName")]
    pub name: String,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub last_update: Option<Timestamp>,
}

/// A floor of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "zoneID")]
    pub zone_id: ZoneId,
    #[serde(default)]
    pub units: Vec<Unit>,
}

/// A room: the leaf that owns device records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "unitID")]
    pub unit_id: UnitId,
    #[serde(rename = "devicesList", default)]
    pub devices: Vec<DeviceRecord>,
}

impl Unit {
    fn empty(unit_id: UnitId) -> Self {
        Self {
            unit_id,
            devices: Vec::new(),
        }
    }
}

/// Site-level metadata written through `upsert_site`.
///
/// Device lists are not part of a location record; any `devicesList` in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    #[serde(rename = "siteID")]
    pub site_id: SiteId,
    #[serde(rename = "siteName")]
    pub name: String,
    pub zones: Vec<ZoneRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    #[serde(rename = "zoneID")]
    pub zone_id: ZoneId,
    pub units: Vec<UnitRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    #[serde(rename = "unitID")]
    pub unit_id: UnitId,
}

impl SiteRecord {
    /// Parse a raw location record payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every violated field.
    pub fn from_json(payload: serde_json::Value) -> Result<Self, ValidationError> {
        schema::validate_site(&payload)?;
        let record: Self = serde_json::from_value(payload).map_err(|_| {
            ValidationError::single("payload", Problem::Invalid("does not match the site schema"))
        })?;
        Ok(record)
    }

    /// Every location this record declares.
    #[must_use]
    pub fn locations(&self) -> Vec<Location> {
        self.zones
            .iter()
            .flat_map(|zone| {
                zone.units.iter().map(|unit| {
                    Location::new(
                        self.site_id.clone(),
                        zone.zone_id.clone(),
                        unit.unit_id.clone(),
                    )
                })
            })
            .collect()
    }
}

impl Directory {
    /// An empty directory rooted at `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            sites: Vec::new(),
            last_update: None,
        }
    }

    /// Every location in tree order.
    #[must_use]
    pub fn locations(&self) -> Vec<Location> {
        self.sites
            .iter()
            .flat_map(|site| {
                site.zones.iter().flat_map(move |zone| {
                    zone.units.iter().map(move |unit| {
                        Location::new(
                            site.site_id.clone(),
                            zone.zone_id.clone(),
                            unit.unit_id.clone(),
                        )
                    })
                })
            })
            .collect()
    }

    #[must_use]
    pub fn site(&self, site_id: &SiteId) -> Option<&Site> {
        self.sites.iter().find(|s| &s.site_id == site_id)
    }

    #[must_use]
    pub fn unit(&self, location: &Location) -> Option<&Unit> {
        self.site(&location.site)?
            .zones
            .iter()
            .find(|z| z.zone_id == location.zone)?
            .units
            .iter()
            .find(|u| u.unit_id == location.unit)
    }

    fn unit_mut(&mut self, location: &Location) -> Option<&mut Unit> {
        self.sites
            .iter_mut()
            .find(|s| s.site_id == location.site)?
            .zones
            .iter_mut()
            .find(|z| z.zone_id == location.zone)?
            .units
            .iter_mut()
            .find(|u| u.unit_id == location.unit)
    }

    /// Every device record in tree order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.sites
            .iter()
            .flat_map(|s| s.zones.iter())
            .flat_map(|z| z.units.iter())
            .flat_map(|u| u.devices.iter())
    }

    #[must_use]
    pub fn device(&self, device_id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices().find(|d| &d.device_id == device_id)
    }

    fn touch(&mut self, site_id: &SiteId, now: Timestamp) {
        if let Some(site) = self.sites.iter_mut().find(|s| &s.site_id == site_id) {
            site.last_update = Some(site.last_update.map_or(now, |prev| prev.max(now)));
        }
        self.last_update = Some(self.last_update.map_or(now, |prev| prev.max(now)));
    }

    /// Insert or replace `record` under its location.
    ///
    /// `lastUpdate` is stamped as `max(now, previous)` so it never goes
    /// backwards. A record whose id is already stored at another location
    /// is moved.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Location`] when the target unit does not
    /// exist; the tree is left untouched.
    pub fn upsert_device(
        &mut self,
        mut record: DeviceRecord,
        now: Timestamp,
    ) -> Result<UpsertOutcome, NotFoundError> {
        if self.unit(&record.location).is_none() {
            return Err(NotFoundError::Location(record.location));
        }
        let previous = self
            .device(&record.device_id)
            .map(|d| (d.location.clone(), d.last_update));

        record.last_update = previous
            .as_ref()
            .map_or(now, |(_, prev)| now.max(*prev));

        if let Some((old_location, _)) = &previous {
            if old_location != &record.location {
                if let Some(unit) = self.unit_mut(old_location) {
                    unit.devices.retain(|d| d.device_id != record.device_id);
                }
            }
        }

        let site_id = record.location.site.clone();
        let stamp = record.last_update;
        let unit = self
            .unit_mut(&record.location)
            .ok_or_else(|| NotFoundError::Location(record.location.clone()))?;
        match unit
            .devices
            .iter_mut()
            .find(|d| d.device_id == record.device_id)
        {
            Some(slot) => *slot = record,
            None => unit.devices.push(record),
        }
        self.touch(&site_id, stamp);

        Ok(if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    /// Remove a device wherever it is stored.
    pub fn remove_device(&mut self, device_id: &DeviceId) -> Option<DeviceRecord> {
        for site in &mut self.sites {
            for zone in &mut site.zones {
                for unit in &mut zone.units {
                    if let Some(idx) = unit.devices.iter().position(|d| &d.device_id == device_id) {
                        return Some(unit.devices.remove(idx));
                    }
                }
            }
        }
        None
    }

    /// Remove every device with `now - lastUpdate > retention`.
    ///
    /// Devices stamped in the future are never stale.
    pub fn prune_stale(&mut self, retention: TimeDelta, now: Timestamp) -> Vec<DeviceRecord> {
        let mut removed = Vec::new();
        for site in &mut self.sites {
            for zone in &mut site.zones {
                for unit in &mut zone.units {
                    let (stale, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut unit.devices)
                        .into_iter()
                        .partition(|d| now.signed_duration_since(d.last_update) > retention);
                    unit.devices = kept;
                    removed.extend(stale);
                }
            }
        }
        removed
    }

    /// Merge a location record into the tree.
    ///
    /// A new site starts with empty units. For an existing site the name is
    /// replaced and missing zones and units are added; nothing is removed.
    pub fn upsert_site(&mut self, record: SiteRecord, now: Timestamp) -> UpsertOutcome {
        let (idx, outcome) = match self.sites.iter().position(|s| s.site_id == record.site_id) {
            Some(idx) => (idx, UpsertOutcome::Updated),
            None => {
                self.sites.push(Site {
                    site_id: record.site_id.clone(),
                    name: String::new(),
                    zones: Vec::new(),
                    last_update: None,
                });
                (self.sites.len() - 1, UpsertOutcome::Created)
            }
        };
        let site = &mut self.sites[idx];
        site.name = record.name;
        for zone_record in record.zones {
            let zone_idx = match site
                .zones
                .iter()
                .position(|z| z.zone_id == zone_record.zone_id)
            {
                Some(zone_idx) => zone_idx,
                None => {
                    site.zones.push(Zone {
                        zone_id: zone_record.zone_id,
                        units: Vec::new(),
                    });
                    site.zones.len() - 1
                }
            };
            let zone = &mut site.zones[zone_idx];
            for unit_record in zone_record.units {
                if !zone.units.iter().any(|u| u.unit_id == unit_record.unit_id) {
                    zone.units.push(Unit::empty(unit_record.unit_id));
                }
            }
        }
        self.touch(&record.site_id, now);
        outcome
    }

    /// Restore the tree invariants on a loaded snapshot.
    ///
    /// Duplicate device ids keep the entry with the newest `lastUpdate`
    /// (the first one on a tie), and every record's `location` is realigned
    /// with the unit it is stored under. Returns the number of fixes made.
    pub fn repair(&mut self) -> usize {
        let mut newest: HashMap<DeviceId, Timestamp> = HashMap::new();
        for device in self.devices() {
            newest
                .entry(device.device_id.clone())
                .and_modify(|ts| *ts = (*ts).max(device.last_update))
                .or_insert(device.last_update);
        }

        let mut fixes = 0;
        let mut kept: HashSet<DeviceId> = HashSet::new();
        for site in &mut self.sites {
            for zone in &mut site.zones {
                for unit in &mut zone.units {
                    let path = Location::new(
                        site.site_id.clone(),
                        zone.zone_id.clone(),
                        unit.unit_id.clone(),
                    );
                    let before = unit.devices.len();
                    unit.devices.retain(|d| {
                        newest.get(&d.device_id) == Some(&d.last_update)
                            && kept.insert(d.device_id.clone())
                    });
                    fixes += before - unit.devices.len();
                    for device in &mut unit.devices {
                        if device.location != path {
                            device.location = path.clone();
                            fixes += 1;
                        }
                    }
                }
            }
        }
        fixes
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::device::DeviceKind;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn home() -> SiteRecord {
        SiteRecord::from_json(json!({
            "siteID": 1,
            "siteName": "Home",
            "zones": [
                {"zoneID": 1, "units": [{"unitID": 1}, {"unitID": 2}]}
            ]
        }))
        .unwrap()
    }

    fn directory() -> Directory {
        let mut dir = Directory::new("td");
        dir.upsert_site(home(), at(0));
        dir
    }

    fn device(id: &str, location: Location, last_update: Timestamp) -> DeviceRecord {
        DeviceRecord::builder()
            .device_id(id)
            .kind(DeviceKind::Actuator)
            .name("light_switch")
            .status("OFF")
            .location(location)
            .last_update(last_update)
            .build()
            .unwrap()
    }

    #[test]
    fn should_list_locations_in_tree_order() {
        assert_eq!(
            directory().locations(),
            vec![Location::of("1", "1", "1"), Location::of("1", "1", "2")]
        );
    }

    #[test]
    fn should_reject_device_when_location_unknown() {
        let mut dir = directory();
        let before = dir.clone();

        let err = dir
            .upsert_device(device("10101", Location::of("1", "9", "1"), at(0)), at(1))
            .unwrap_err();

        assert_eq!(err, NotFoundError::Location(Location::of("1", "9", "1")));
        assert_eq!(dir, before);
    }

    #[test]
    fn should_create_then_update_device() {
        let mut dir = directory();
        let loc = Location::of("1", "1", "1");

        let first = dir.upsert_device(device("10101", loc.clone(), at(0)), at(5));
        let second = dir.upsert_device(device("10101", loc.clone(), at(0)), at(6));

        assert_eq!(first, Ok(UpsertOutcome::Created));
        assert_eq!(second, Ok(UpsertOutcome::Updated));
        assert_eq!(dir.unit(&loc).unwrap().devices.len(), 1);
        assert_eq!(dir.device(&DeviceId::new("10101")).unwrap().last_update, at(6));
    }

    #[test]
    fn should_never_move_last_update_backwards() {
        let mut dir = directory();
        let loc = Location::of("1", "1", "1");
        dir.upsert_device(device("10101", loc.clone(), at(0)), at(100))
            .unwrap();

        dir.upsert_device(device("10101", loc, at(0)), at(50)).unwrap();

        assert_eq!(
            dir.device(&DeviceId::new("10101")).unwrap().last_update,
            at(100)
        );
    }

    #[test]
    fn should_move_device_when_location_changes() {
        let mut dir = directory();
        dir.upsert_device(device("10101", Location::of("1", "1", "1"), at(0)), at(1))
            .unwrap();

        dir.upsert_device(device("10101", Location::of("1", "1", "2"), at(0)), at(2))
            .unwrap();

        assert!(dir.unit(&Location::of("1", "1", "1")).unwrap().devices.is_empty());
        assert_eq!(dir.unit(&Location::of("1", "1", "2")).unwrap().devices.len(), 1);
        assert_eq!(dir.devices().count(), 1);
    }

    #[test]
    fn should_remove_device_and_report_absence() {
        let mut dir = directory();
        dir.upsert_device(device("10101", Location::of("1", "1", "1"), at(0)), at(1))
            .unwrap();

        assert!(dir.remove_device(&DeviceId::new("10101")).is_some());
        assert!(dir.remove_device(&DeviceId::new("10101")).is_none());
    }

    #[test]
    fn should_prune_only_devices_strictly_older_than_retention() {
        let mut dir = directory();
        let loc = Location::of("1", "1", "1");
        dir.upsert_device(device("old", loc.clone(), at(0)), at(0))
            .unwrap();
        dir.upsert_device(device("edge", loc.clone(), at(0)), at(400))
            .unwrap();
        dir.upsert_device(device("fresh", loc.clone(), at(0)), at(900))
            .unwrap();

        let removed = dir.prune_stale(TimeDelta::seconds(600), at(1000));

        let ids: Vec<_> = removed.iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["old"]);
        assert_eq!(dir.devices().count(), 2);
        assert!(dir.prune_stale(TimeDelta::seconds(600), at(1000)).is_empty());
    }

    #[test]
    fn should_merge_site_without_dropping_units() {
        let mut dir = directory();
        dir.upsert_device(device("10101", Location::of("1", "1", "2"), at(0)), at(1))
            .unwrap();

        let outcome = dir.upsert_site(
            SiteRecord::from_json(json!({
                "siteID": "1",
                "siteName": "Cottage",
                "zones": [{"zoneID": "2", "units": [{"unitID": "1"}]}]
            }))
            .unwrap(),
            at(2),
        );

        assert_eq!(outcome, UpsertOutcome::Updated);
        let site = dir.site(&SiteId::new("1")).unwrap();
        assert_eq!(site.name, "Cottage");
        assert_eq!(dir.locations().len(), 3);
        assert_eq!(dir.devices().count(), 1);
        assert_eq!(site.last_update, Some(at(2)));
    }

    #[test]
    fn should_fold_repeated_zone_ids_of_new_site() {
        let mut dir = Directory::new("td");
        let record = SiteRecord::from_json(json!({
            "siteID": "1",
            "siteName": "Home",
            "zones": [
                {"zoneID": "1", "units": [{"unitID": "1"}]},
                {"zoneID": "1", "units": [{"unitID": "2"}, {"unitID": "2"}]}
            ]
        }))
        .unwrap();

        assert_eq!(dir.upsert_site(record, at(0)), UpsertOutcome::Created);

        let second = Location::of("1", "1", "2");
        assert_eq!(dir.site(&SiteId::new("1")).unwrap().zones.len(), 1);
        assert_eq!(dir.locations(), vec![Location::of("1", "1", "1"), second.clone()]);
        assert!(dir.unit(&second).is_some());
        assert_eq!(
            dir.upsert_device(device("10201", second, at(0)), at(1)).unwrap(),
            UpsertOutcome::Created
        );
    }

    #[test]
    fn should_report_nested_violations_for_site_record() {
        let err = SiteRecord::from_json(json!({"siteID": "1", "zones": []})).unwrap_err();
        assert!(err.mentions("siteName"));
    }

    #[test]
    fn should_repair_duplicates_and_misplaced_records() {
        let mut dir = directory();
        let first = Location::of("1", "1", "1");
        let second = Location::of("1", "1", "2");
        dir.unit_mut(&first)
            .unwrap()
            .devices
            .push(device("dup", first.clone(), at(1)));
        dir.unit_mut(&second)
            .unwrap()
            .devices
            .push(device("dup", second.clone(), at(9)));
        dir.unit_mut(&second)
            .unwrap()
            .devices
            .push(device("lost", first.clone(), at(1)));

        let fixes = dir.repair();

        assert_eq!(fixes, 2);
        assert!(dir.unit(&first).unwrap().devices.is_empty());
        assert_eq!(dir.device(&DeviceId::new("dup")).unwrap().last_update, at(9));
        assert_eq!(dir.device(&DeviceId::new("lost")).unwrap().location, second);
        assert_eq!(dir.repair(), 0);
    }

    #[test]
    fn should_round_trip_through_json_snapshot() {
        let mut dir = directory();
        dir.upsert_device(device("10101", Location::of("1", "1", "1"), at(0)), at(1))
            .unwrap();

        let json = serde_json::to_string(&dir).unwrap();
        let back: Directory = serde_json::from_str(&json).unwrap();

        assert_eq!(back, dir);
    }
}

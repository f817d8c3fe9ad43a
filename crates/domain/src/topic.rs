//! Topic shapes used on the bus.
//!
//! Inbound: `{ns}/sensors/{site}/{zone}/{unit}/{sensor_kind}`.
//! Outbound: `{ns}/commands/{site}/{zone}/{unit}/{device_name}`.

use std::fmt;
use std::str::FromStr;

use crate::error::MalformedEventError;
use crate::id::{SiteId, UnitId, ZoneId};
use crate::location::Location;

const SENSORS: &str = "sensors";
const COMMANDS: &str = "commands";

/// The sensor streams the controller correlates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Motion,
    Light,
}

impl SensorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Motion => "motion_sensor",
            Self::Light => "light_sensor",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = MalformedEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "motion_sensor" => Ok(Self::Motion),
            "light_sensor" => Ok(Self::Light),
            other => Err(MalformedEventError::UnknownSensor {
                kind: other.to_owned(),
            }),
        }
    }
}

/// A parsed inbound sensor topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorTopic {
    pub namespace: String,
    pub location: Location,
    pub kind: SensorKind,
}

impl SensorTopic {
    /// Parse `{ns}/sensors/{site}/{zone}/{unit}/{kind}`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEventError::Topic`] when the topic does not have
    /// exactly six segments with `sensors` second or when an id segment is
    /// empty, and [`MalformedEventError::UnknownSensor`] for other kinds.
    pub fn parse(topic: &str) -> Result<Self, MalformedEventError> {
        let malformed = || MalformedEventError::Topic {
            topic: topic.to_owned(),
        };
        let segments: Vec<&str> = topic.split('/').collect();
        let [namespace, SENSORS, site, zone, unit, kind] = segments.as_slice() else {
            return Err(malformed());
        };
        let site: SiteId = site.parse().map_err(|_| malformed())?;
        let zone: ZoneId = zone.parse().map_err(|_| malformed())?;
        let unit: UnitId = unit.parse().map_err(|_| malformed())?;
        if namespace.is_empty() {
            return Err(malformed());
        }
        Ok(Self {
            namespace: (*namespace).to_owned(),
            location: Location::new(site, zone, unit),
            kind: kind.parse()?,
        })
    }
}

/// Filter matching every sensor stream of `location` under `namespace`.
#[must_use]
pub fn sensor_filter(namespace: &str, location: &Location) -> String {
    format!("{namespace}/{SENSORS}/{location}/#")
}

/// Topic an actuator named `device_name` at `location` listens on.
#[must_use]
pub fn command_topic(namespace: &str, location: &Location, device_name: &str) -> String {
    format!("{namespace}/{COMMANDS}/{location}/{device_name}")
}

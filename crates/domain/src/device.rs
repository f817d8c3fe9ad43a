//! Device record: one sensor or actuator registered in the directory.

use serde::{Deserialize, Serialize};

use crate::error::{Problem, ValidationError};
use crate::id::{self, DeviceId};
use crate::location::Location;
use crate::schema;
use crate::time::{self, Timestamp};

/// Whether a device produces readings or accepts commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Sensor,
    Actuator,
}

/// How a device can be reached (e.g. the MQTT topics it listens on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDetail {
    #[serde(rename = "serviceType")]
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic: Vec<String>,
}

/// A device as stored in the directory.
///
/// `location` always matches the unit the record is stored under, and
/// `device_id` is unique across the whole directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(rename = "deviceID")]
    pub device_id: DeviceId,
    #[serde(rename = "deviceKind")]
    pub kind: DeviceKind,
    #[serde(rename = "deviceName")]
    pub name: String,
    #[serde(rename = "deviceStatus")]
    pub status: String,
    pub available_statuses: Vec<String>,
    #[serde(rename = "deviceLocation")]
    pub location: Location,
    pub measure_type: Vec<String>,
    pub available_services: Vec<String>,
    pub services_details: Vec<ServiceDetail>,
    #[serde(default = "time::now")]
    pub last_update: Timestamp,
}

impl DeviceRecord {
    /// Create a builder for constructing a [`DeviceRecord`].
    #[must_use]
    pub fn builder() -> DeviceRecordBuilder {
        DeviceRecordBuilder::default()
    }

    /// Parse a raw registration payload.
    ///
    /// The payload is first checked against [`schema::DEVICE_SCHEMA`], so the
    /// error lists every violated field rather than the first serde failure.
    /// A client-supplied `lastUpdate` is ignored: the directory stamps it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the payload does not match the schema.
    pub fn from_json(mut payload: serde_json::Value) -> Result<Self, ValidationError> {
        schema::validate_device(&payload)?;
        if let Some(object) = payload.as_object_mut() {
            object.remove("lastUpdate");
        }
        let record: Self = serde_json::from_value(payload).map_err(|_| {
            ValidationError::single("payload", Problem::Invalid("does not match the device schema"))
        })?;
        record.validate()?;
        Ok(record)
    }

    /// Check domain invariants on an already-typed record.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every empty or malformed field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        check_id(&mut errors, "deviceID", self.device_id.as_str());
        if self.name.is_empty() {
            errors.push("deviceName", Problem::Empty);
        }
        if self.status.is_empty() {
            errors.push("deviceStatus", Problem::Empty);
        }
        check_id(&mut errors, "deviceLocation.siteID", self.location.site.as_str());
        check_id(&mut errors, "deviceLocation.zoneID", self.location.zone.as_str());
        check_id(&mut errors, "deviceLocation.unitID", self.location.unit.as_str());
        errors.into_result()
    }

    #[must_use]
    pub fn is_actuator(&self) -> bool {
        self.kind == DeviceKind::Actuator
    }

    /// Whether this device is an actuator answering to `name` at `location`.
    #[must_use]
    pub fn is_actuator_named(&self, location: &Location, name: &str) -> bool {
        self.is_actuator() && self.name == name && &self.location == location
    }
}

fn check_id(errors: &mut ValidationError, field: &str, value: &str) {
    match id::check(value) {
        Ok(()) => {}
        Err(id::InvalidIdError::Empty) => errors.push(field, Problem::Missing),
        Err(id::InvalidIdError::Reserved(_)) => {
            errors.push(field, Problem::Invalid("contains a reserved topic character"));
        }
    }
}

/// Step-by-step builder for [`DeviceRecord`].
#[derive(Debug, Default)]
pub struct DeviceRecordBuilder {
    device_id: Option<DeviceId>,
    kind: Option<DeviceKind>,
    name: Option<String>,
    status: Option<String>,
    available_statuses: Vec<String>,
    location: Option<Location>,
    measure_type: Vec<String>,
    available_services: Vec<String>,
    services_details: Vec<ServiceDetail>,
    last_update: Option<Timestamp>,
}

impl DeviceRecordBuilder {
    #[must_use]
    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(DeviceId::new(id));
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn available_status(mut self, status: impl Into<String>) -> Self {
        self.available_statuses.push(status.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn measure(mut self, measure: impl Into<String>) -> Self {
        self.measure_type.push(measure.into());
        self
    }

    /// Declare an MQTT service listening on `topic`.
    #[must_use]
    pub fn mqtt_topic(mut self, topic: impl Into<String>) -> Self {
        if !self.available_services.iter().any(|s| s == "MQTT") {
            self.available_services.push("MQTT".to_owned());
        }
        match self
            .services_details
            .iter_mut()
            .find(|d| d.service_type == "MQTT")
        {
            Some(detail) => detail.topic.push(topic.into()),
            None => self.services_details.push(ServiceDetail {
                service_type: "MQTT".to_owned(),
                topic: vec![topic.into()],
            }),
        }
        self
    }

    #[must_use]
    pub fn last_update(mut self, at: Timestamp) -> Self {
        self.last_update = Some(at);
        self
    }

    /// Consume the builder, validate, and return a [`DeviceRecord`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every missing or empty field.
    pub fn build(self) -> Result<DeviceRecord, ValidationError> {
        let mut errors = ValidationError::new();
        if self.kind.is_none() {
            errors.push("deviceKind", Problem::Missing);
        }
        if self.location.is_none() {
            errors.push("deviceLocation", Problem::Missing);
        }
        let (Some(kind), Some(location)) = (self.kind, self.location) else {
            return Err(errors);
        };
        let record = DeviceRecord {
            device_id: self.device_id.unwrap_or_else(|| DeviceId::new("")),
            kind,
            name: self.name.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            available_statuses: self.available_statuses,
            location,
            measure_type: self.measure_type,
            available_services: self.available_services,
            services_details: self.services_details,
            last_update: self.last_update.unwrap_or_else(time::now),
        };
        record.validate()?;
        Ok(record)
    }
}

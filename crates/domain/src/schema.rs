//! Table-driven validation of raw directory payloads.
//!
//! Payloads arrive as loosely-typed JSON. Before they are turned into typed
//! records every field is checked against a schema table and **all**
//! violations are collected, so a caller sees the complete defect list in
//! one round trip.

use serde_json::Value;

use crate::error::{Problem, ValidationError};
use crate::id;

/// Shape a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// A string or integer usable as an identifier.
    Id,
    /// A non-empty string.
    Text,
    /// `"sensor"` or `"actuator"`.
    Kind,
    /// A JSON object (validated further by a nested schema).
    Object,
    /// A JSON array (validated further by a nested schema).
    List,
    /// A JSON array of strings.
    TextList,
}

impl FieldType {
    fn check(self, value: &Value) -> Result<(), Problem> {
        match self {
            Self::Id => {
                let text = id::json_text(value).ok_or(Problem::WrongType {
                    expected: "string or integer",
                })?;
                id::check(&text).map_err(|err| match err {
                    id::InvalidIdError::Empty => Problem::Empty,
                    id::InvalidIdError::Reserved(_) => {
                        Problem::Invalid("contains a reserved topic character")
                    }
                })
            }
            Self::Text => match value.as_str() {
                Some("") => Err(Problem::Empty),
                Some(_) => Ok(()),
                None => Err(Problem::WrongType { expected: "string" }),
            },
            Self::Kind => match value.as_str() {
                Some("sensor" | "actuator") => Ok(()),
                Some(_) => Err(Problem::Invalid("must be \"sensor\" or \"actuator\"")),
                None => Err(Problem::WrongType { expected: "string" }),
            },
            Self::Object if value.is_object() => Ok(()),
            Self::Object => Err(Problem::WrongType { expected: "object" }),
            Self::List if value.is_array() => Ok(()),
            Self::List => Err(Problem::WrongType { expected: "list" }),
            Self::TextList => match value.as_array() {
                Some(items) if items.iter().all(Value::is_string) => Ok(()),
                _ => Err(Problem::WrongType {
                    expected: "list of strings",
                }),
            },
        }
    }
}

/// One row of a schema table.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

const fn required(name: &'static str, ty: FieldType) -> FieldRule {
    FieldRule {
        name,
        ty,
        required: true,
    }
}

const fn optional(name: &'static str, ty: FieldType) -> FieldRule {
    FieldRule {
        name,
        ty,
        required: false,
    }
}

/// Fields of a device registration.
pub const DEVICE_SCHEMA: &[FieldRule] = &[
    required("deviceID", FieldType::Id),
    required("deviceKind", FieldType::Kind),
    required("deviceName", FieldType::Text),
    required("deviceStatus", FieldType::Text),
    required("availableStatuses", FieldType::TextList),
    required("deviceLocation", FieldType::Object),
    required("measureType", FieldType::TextList),
    required("availableServices", FieldType::TextList),
    required("servicesDetails", FieldType::List),
];

/// Fields of `deviceLocation`.
pub const LOCATION_SCHEMA: &[FieldRule] = &[
    required("siteID", FieldType::Id),
    required("zoneID", FieldType::Id),
    required("unitID", FieldType::Id),
];

/// Fields of each `servicesDetails` entry.
pub const SERVICE_DETAIL_SCHEMA: &[FieldRule] = &[
    required("serviceType", FieldType::Text),
    optional("topic", FieldType::TextList),
];

/// Fields of a site (location record) registration.
pub const SITE_SCHEMA: &[FieldRule] = &[
    required("siteID", FieldType::Id),
    required("siteName", FieldType::Text),
    required("zones", FieldType::List),
];

/// Fields of each `zones` entry.
pub const ZONE_SCHEMA: &[FieldRule] = &[
    required("zoneID", FieldType::Id),
    required("units", FieldType::List),
];

/// Fields of each `units` entry.
pub const UNIT_SCHEMA: &[FieldRule] = &[required("unitID", FieldType::Id)];

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Check `payload` against `schema`, appending every violation to `errors`.
///
/// Returns `true` when `payload` was an object (so nested checks make sense).
pub fn check(
    payload: &Value,
    schema: &[FieldRule],
    prefix: &str,
    errors: &mut ValidationError,
) -> bool {
    let Some(object) = payload.as_object() else {
        let field = if prefix.is_empty() { "payload" } else { prefix };
        errors.push(field, Problem::WrongType { expected: "object" });
        return false;
    };
    for rule in schema {
        match object.get(rule.name) {
            None if rule.required => errors.push(join(prefix, rule.name), Problem::Missing),
            None => {}
            Some(value) => {
                if let Err(problem) = rule.ty.check(value) {
                    errors.push(join(prefix, rule.name), problem);
                }
            }
        }
    }
    true
}

fn check_each(
    payload: &Value,
    list: &str,
    schema: &[FieldRule],
    prefix: &str,
    errors: &mut ValidationError,
) {
    let Some(items) = payload.get(list).and_then(Value::as_array) else {
        return;
    };
    for (idx, item) in items.iter().enumerate() {
        check(item, schema, &format!("{}[{idx}]", join(prefix, list)), errors);
    }
}

/// Validate a device registration payload.
///
/// # Errors
///
/// Returns every violation found, including nested `deviceLocation` and
/// `servicesDetails` fields.
pub fn validate_device(payload: &Value) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    if check(payload, DEVICE_SCHEMA, "", &mut errors) {
        if let Some(location) = payload.get("deviceLocation").filter(|v| v.is_object()) {
            check(location, LOCATION_SCHEMA, "deviceLocation", &mut errors);
        }
        check_each(payload, "servicesDetails", SERVICE_DETAIL_SCHEMA, "", &mut errors);
    }
    errors.into_result()
}

/// Validate a site (location record) payload.
///
/// # Errors
///
/// Returns every violation found, including nested zones and units.
pub fn validate_site(payload: &Value) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    if check(payload, SITE_SCHEMA, "", &mut errors) {
        let zones = payload.get("zones").and_then(Value::as_array);
        for (idx, zone) in zones.into_iter().flatten().enumerate() {
            let prefix = format!("zones[{idx}]");
            if check(zone, ZONE_SCHEMA, &prefix, &mut errors) {
                check_each(zone, "units", UNIT_SCHEMA, &prefix, &mut errors);
            }
        }
    }
    errors.into_result()
}

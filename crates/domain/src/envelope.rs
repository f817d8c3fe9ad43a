//! Wire envelope shared by sensor readings and actuator commands.
//!
//! ```json
//! {"bn": "td/sensors/1/1/1/motion_sensor",
//!  "e": [{"n": "motion", "u": "detection", "t": "1721000000.5", "v": "Detected"}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decision::Command;
use crate::error::MalformedEventError;
use crate::location::Location;
use crate::time::{self, Timestamp};
use crate::topic::{SensorKind, SensorTopic};

/// Motion value meaning "someone is there".
pub const MOTION_DETECTED: &str = "Detected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    #[serde(rename = "bn")]
    pub base_name: String,
    #[serde(rename = "e")]
    pub events: Vec<EventDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventDescriptor {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "u")]
    pub unit: String,
    /// Epoch seconds, as a number or a numeric string.
    #[serde(rename = "t")]
    pub timestamp: Value,
    #[serde(rename = "v")]
    pub value: Value,
}

impl Envelope {
    /// Decode an envelope from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEventError::Payload`] on invalid JSON or shape.
    pub fn from_slice(payload: &[u8]) -> Result<Self, MalformedEventError> {
        serde_json::from_slice(payload).map_err(MalformedEventError::Payload)
    }

    /// The only descriptor of the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEventError::EventCount`] unless there is exactly one.
    pub fn single(&self) -> Result<&EventDescriptor, MalformedEventError> {
        match self.events.as_slice() {
            [event] => Ok(event),
            other => Err(MalformedEventError::EventCount(other.len())),
        }
    }

    /// Build the payload published to an actuator's command topic.
    #[must_use]
    pub fn command(topic: &str, command: Command, at: Timestamp) -> Self {
        Self {
            base_name: topic.to_owned(),
            events: vec![EventDescriptor {
                name: "actuator".to_owned(),
                unit: "command".to_owned(),
                timestamp: Value::String(time::to_epoch_secs(at).to_string()),
                value: Value::String(command.status().to_owned()),
            }],
        }
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// Propagates the `serde_json` error (not expected for this shape).
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl EventDescriptor {
    /// When the reading was taken.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEventError::Timestamp`] when `t` is not a finite
    /// number of epoch seconds.
    pub fn observed_at(&self) -> Result<Timestamp, MalformedEventError> {
        let secs = match &self.timestamp {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        secs.and_then(time::from_epoch_secs)
            .ok_or_else(|| MalformedEventError::Timestamp(self.timestamp.to_string()))
    }
}

/// A decoded sensor value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Motion { detected: bool },
    Light { lux: f64 },
}

impl Reading {
    fn decode(kind: SensorKind, value: &Value) -> Result<Self, MalformedEventError> {
        let invalid = |kind: &'static str| MalformedEventError::Value {
            kind,
            value: value.to_string(),
        };
        match kind {
            SensorKind::Motion => value
                .as_str()
                .map(|v| Self::Motion {
                    detected: v == MOTION_DETECTED,
                })
                .ok_or_else(|| invalid("motion")),
            SensorKind::Light => {
                let lux = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                lux.filter(|lux| lux.is_finite())
                    .map(|lux| Self::Light { lux })
                    .ok_or_else(|| invalid("light"))
            }
        }
    }
}

/// One sensor reading routed to a location.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub location: Location,
    pub observed_at: Timestamp,
    pub reading: Reading,
}

impl SensorEvent {
    #[must_use]
    pub fn motion(location: Location, detected: bool, observed_at: Timestamp) -> Self {
        Self {
            location,
            observed_at,
            reading: Reading::Motion { detected },
        }
    }

    #[must_use]
    pub fn light(location: Location, lux: f64, observed_at: Timestamp) -> Self {
        Self {
            location,
            observed_at,
            reading: Reading::Light { lux },
        }
    }

    /// Decode an inbound message: location and kind from the topic, value
    /// and observation time from the payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEventError`] for any unexpected topic or payload.
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Self, MalformedEventError> {
        let topic = SensorTopic::parse(topic)?;
        let envelope = Envelope::from_slice(payload)?;
        let event = envelope.single()?;
        Ok(Self {
            reading: Reading::decode(topic.kind, &event.value)?,
            observed_at: event.observed_at()?,
            location: topic.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    const MOTION_TOPIC: &str = "td/sensors/1/1/1/motion_sensor";
    const LIGHT_TOPIC: &str = "td/sensors/1/1/1/light_sensor";

    fn payload(value: &Value, t: &Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "bn": "td/sensors/1/1/1/sensor",
            "e": [{"n": "motion", "u": "detection", "t": t, "v": value}]
        }))
        .unwrap()
    }

    #[test]
    fn should_decode_detected_motion_with_string_timestamp() {
        let event =
            SensorEvent::decode(MOTION_TOPIC, &payload(&json!("Detected"), &json!("1700000000.5")))
                .unwrap();

        assert_eq!(event.location, Location::of("1", "1", "1"));
        assert_eq!(event.reading, Reading::Motion { detected: true });
        assert_eq!(event.observed_at.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn should_treat_other_motion_strings_as_not_detected() {
        let event =
            SensorEvent::decode(MOTION_TOPIC, &payload(&json!("No Motion"), &json!(1)))
                .unwrap();
        assert_eq!(event.reading, Reading::Motion { detected: false });
    }

    #[test]
    fn should_reject_non_string_motion_value() {
        assert!(matches!(
            SensorEvent::decode(MOTION_TOPIC, &payload(&json!(true), &json!(1))),
            Err(MalformedEventError::Value { kind: "motion", .. })
        ));
    }

    #[test]
    fn should_decode_light_from_number_or_numeric_string() {
        let from_number =
            SensorEvent::decode(LIGHT_TOPIC, &payload(&json!(512.5), &json!(1))).unwrap();
        let from_string =
            SensorEvent::decode(LIGHT_TOPIC, &payload(&json!("512.5"), &json!(1))).unwrap();

        assert_eq!(from_number.reading, Reading::Light { lux: 512.5 });
        assert_eq!(from_string.reading, from_number.reading);
    }

    #[test]
    fn should_reject_non_numeric_light() {
        assert!(matches!(
            SensorEvent::decode(LIGHT_TOPIC, &payload(&json!("bright"), &json!(1))),
            Err(MalformedEventError::Value { kind: "light", .. })
        ));
        assert!(matches!(
            SensorEvent::decode(LIGHT_TOPIC, &payload(&json!("NaN"), &json!(1))),
            Err(MalformedEventError::Value { .. })
        ));
    }

    #[test]
    fn should_reject_bad_timestamp() {
        assert!(matches!(
            SensorEvent::decode(LIGHT_TOPIC, &payload(&json!(1), &json!("yesterday"))),
            Err(MalformedEventError::Timestamp(_))
        ));
    }

    #[test]
    fn should_reject_unknown_fields_and_event_counts() {
        let extra = br#"{"bn": "x", "e": [], "extra": 1}"#;
        assert!(matches!(
            SensorEvent::decode(LIGHT_TOPIC, extra),
            Err(MalformedEventError::Payload(_))
        ));

        let empty = br#"{"bn": "x", "e": []}"#;
        assert!(matches!(
            SensorEvent::decode(LIGHT_TOPIC, empty),
            Err(MalformedEventError::EventCount(0))
        ));
    }

    #[test]
    fn should_build_command_envelope() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let envelope = Envelope::command("td/commands/1/1/1/light_switch", Command::TurnOn, at);

        let json: Value = serde_json::from_slice(&envelope.to_vec().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({
                "bn": "td/commands/1/1/1/light_switch",
                "e": [{"n": "actuator", "u": "command", "t": "1700000000", "v": "ON"}]
            })
        );
    }
}

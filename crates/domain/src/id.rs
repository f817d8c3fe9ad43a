//! Typed identifier newtypes backed by strings.
//!
//! Identifiers end up as topic segments, so they must be non-empty and free
//! of the MQTT separators `/`, `+` and `#`. In JSON they are accepted either
//! as strings or as integers and always normalised to strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Why a string cannot be used as an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidIdError {
    #[error("identifier must not be empty")]
    Empty,
    #[error("identifier {0:?} contains a reserved topic character")]
    Reserved(String),
}

/// Check that `value` is usable as an identifier.
///
/// # Errors
///
/// Returns [`InvalidIdError`] when `value` is empty or contains `/`, `+` or `#`.
pub fn check(value: &str) -> Result<(), InvalidIdError> {
    if value.is_empty() {
        return Err(InvalidIdError::Empty);
    }
    if value.contains(['/', '+', '#']) {
        return Err(InvalidIdError::Reserved(value.to_owned()));
    }
    Ok(())
}

/// Read a JSON string or integer as identifier text.
#[must_use]
pub fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Signed(n) => n.to_string(),
            Self::Unsigned(n) => n.to_string(),
        }
    }
}

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier without checking it.
            ///
            /// Prefer [`str::parse`] for untrusted input.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                check(s)?;
                Ok(Self(s.to_owned()))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer)?
                    .into_text()
                    .parse()
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

define_id!(
    /// Unique identifier of a [`DeviceRecord`](crate::device::DeviceRecord).
    DeviceId
);

define_id!(
    /// Identifier of a [`Site`](crate::directory::Site) (a building).
    SiteId
);

define_id!(
    /// Identifier of a [`Zone`](crate::directory::Zone) within a site (a floor).
    ZoneId
);

define_id!(
    /// Identifier of a [`Unit`](crate::directory::Unit) within a zone (a room).
    UnitId
);

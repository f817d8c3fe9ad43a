//! Directory events: what changed in the directory after a successful write.

use serde::Serialize;

use crate::device::{DeviceKind, DeviceRecord};
use crate::id::DeviceId;
use crate::location::Location;

/// Published by the directory service once a write has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryEvent {
    DeviceUpserted {
        device_id: DeviceId,
        kind: DeviceKind,
        location: Location,
        status: String,
    },
    DeviceRemoved {
        device_id: DeviceId,
    },
}

impl DirectoryEvent {
    #[must_use]
    pub fn upserted(record: &DeviceRecord) -> Self {
        Self::DeviceUpserted {
            device_id: record.device_id.clone(),
            kind: record.kind,
            location: record.location.clone(),
            status: record.status.clone(),
        }
    }

    #[must_use]
    pub fn removed(device_id: DeviceId) -> Self {
        Self::DeviceRemoved { device_id }
    }

    /// The device the event is about.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::DeviceUpserted { device_id, .. } | Self::DeviceRemoved { device_id } => device_id,
        }
    }
}

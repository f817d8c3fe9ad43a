//! Time and timestamp helpers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp used for `lastUpdate`, event observation times, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert fractional seconds since the Unix epoch into a [`Timestamp`].
///
/// Returns `None` for non-finite or out-of-range values.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn from_epoch_secs(secs: f64) -> Option<Timestamp> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).round();
    if millis.abs() > 8.0e15 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Fractional seconds since the Unix epoch, as sensors publish them.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn to_epoch_secs(ts: Timestamp) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}

/// Build a [`TimeDelta`] from whole seconds, saturating on overflow.
#[must_use]
pub fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

//! MQTT adapter error types.

use thiefwatch_domain::error::WatchError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The client identifier is empty or starts with a space.
    #[error("invalid MQTT client id {0:?}")]
    InvalidClientId(String),

    /// The configured QoS is not 0, 1 or 2.
    #[error("invalid MQTT QoS level {0}")]
    InvalidQos(u8),

    /// The rumqttc client returned an error (usually: event loop gone).
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),
}

impl MqttError {
    /// Convert into a [`WatchError::Transport`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> WatchError {
        WatchError::Transport(Box::new(self))
    }
}

impl From<MqttError> for WatchError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_invalid_qos_error() {
        let err = MqttError::InvalidQos(3);
        assert_eq!(err.to_string(), "invalid MQTT QoS level 3");
    }

    #[test]
    fn should_convert_into_transport_error() {
        let err: WatchError = MqttError::InvalidClientId(String::new()).into();
        assert!(matches!(err, WatchError::Transport(_)));
    }
}

//! MQTT transport configuration.

use serde::Deserialize;

/// Configuration for the MQTT transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// QoS level (0, 1 or 2) used for publishing and subscribing.
    pub qos: u8,
    /// Capacity of the client's outgoing request queue.
    pub channel_capacity: usize,
    /// Pause after a connection error before polling again, in seconds.
    pub reconnect_delay_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "thiefwatch-controller".to_string(),
            keep_alive_secs: 30,
            qos: 2,
            channel_capacity: 64,
            reconnect_delay_secs: 5,
        }
    }
}

//! # thiefwatch-adapter-mqtt
//!
//! MQTT adapter: the bus sensors and actuators talk on.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker ([`connect`])
//! - Implement the [`Transport`] port (publish, subscribe, unsubscribe)
//! - Drive the rumqttc event loop and hand every inbound publish to a
//!   [`MessageHandler`] in its own task ([`MqttEventLoop::spawn`])
//!
//! The event loop must keep polling for client requests to make progress,
//! so it never awaits a handler itself.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `thiefwatch-app` and `thiefwatch-domain`.

pub mod config;
pub mod error;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;

use thiefwatch_app::ports::{MessageHandler, Transport};
use thiefwatch_domain::error::WatchError;

pub use config::MqttConfig;
pub use error::MqttError;

/// Map a numeric QoS level onto rumqttc's enum.
///
/// # Errors
///
/// Returns [`MqttError::InvalidQos`] for anything but 0, 1 or 2.
pub fn qos(level: u8) -> Result<QoS, MqttError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(other)),
    }
}

/// Build the client and its event loop. Nothing touches the network until
/// the event loop is polled.
///
/// # Errors
///
/// Returns [`MqttError`] when the client id or QoS is invalid.
pub fn connect(config: &MqttConfig) -> Result<(MqttTransport, MqttEventLoop), MqttError> {
    if config.client_id.is_empty() || config.client_id.starts_with(' ') {
        return Err(MqttError::InvalidClientId(config.client_id.clone()));
    }
    let qos = qos(config.qos)?;

    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.broker_host.clone(),
        config.broker_port,
    );
    options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));

    let (client, eventloop) = AsyncClient::new(options, config.channel_capacity.max(1));
    Ok((
        MqttTransport { client, qos },
        MqttEventLoop {
            eventloop,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        },
    ))
}

/// Outbound half: a cloneable handle onto the client request queue.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
}

impl MqttTransport {
    /// Ask the broker to close the session.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] when the event loop is already gone.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await.map_err(MqttError::Client)
    }
}

impl Transport for MqttTransport {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), WatchError>> + Send {
        let topic = topic.to_owned();
        async move {
            self.client
                .publish(topic, self.qos, false, payload)
                .await
                .map_err(|err| MqttError::Client(err).into_domain())
        }
    }

    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), WatchError>> + Send {
        let filter = filter.to_owned();
        async move {
            self.client
                .subscribe(filter, self.qos)
                .await
                .map_err(|err| MqttError::Client(err).into_domain())
        }
    }

    fn unsubscribe(&self, filter: &str) -> impl Future<Output = Result<(), WatchError>> + Send {
        let filter = filter.to_owned();
        async move {
            self.client
                .unsubscribe(filter)
                .await
                .map_err(|err| MqttError::Client(err).into_domain())
        }
    }
}

/// Inbound half: owns the rumqttc event loop.
pub struct MqttEventLoop {
    eventloop: EventLoop,
    reconnect_delay: Duration,
}

impl MqttEventLoop {
    /// Poll forever, dispatching every event to `handler`.
    ///
    /// Connection errors are logged; rumqttc reconnects on the next poll.
    pub fn spawn<H: MessageHandler + 'static>(mut self, handler: Arc<H>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        tracing::info!(code = ?ack.code, "connected to MQTT broker");
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move { handler.handle_connected().await });
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let topic = String::from_utf8_lossy(publish.topic.as_ref()).into_owned();
                        tracing::debug!(topic = %topic, bytes = publish.payload.len(), "message received");
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            handler.handle_message(&topic, &publish.payload).await;
                        });
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            retry_in_secs = self.reconnect_delay.as_secs(),
                            "MQTT connection error"
                        );
                        tokio::time::sleep(self.reconnect_delay).await;
                    }
                }
            }
        })
    }
}

//! Impure I/O operations for the MQTT transport
//!
//! This module owns the rumqttc client and event loop. The event loop is
//! polled only from the session's task, so callbacks run to completion before
//! the next packet is read.

use super::connection::{configure_mqtt_options, MqttError};
use super::message_handler::MessageHandler;
use crate::config::ClientConfig;
use crate::session::Subscription;
use crate::transport::{ConnectReturnCode, Transport, TransportEvent};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, EventLoop};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, trace, warn, Instrument};

/// Capacity of the request channel between client handle and event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// The live connection handle to one broker
pub struct MqttTransport {
    client: AsyncClient,
    event_loop: EventLoop,
    endpoint: String,
    pending: VecDeque<TransportEvent>,
    refused: Option<ConnectReturnCode>,
}

impl MqttTransport {
    /// Open the connection and wait for the broker's CONNACK.
    ///
    /// An unreachable broker or a missing CONNACK is an error. A CONNACK that
    /// refuses the session is not: it is queued as the first event so the
    /// session can report it through its connect callback.
    pub async fn connect(config: &ClientConfig) -> Result<Self, MqttError> {
        let mqtt_options = configure_mqtt_options(config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        let mut transport = Self {
            client,
            event_loop,
            endpoint: config.endpoint(),
            pending: VecDeque::new(),
            refused: None,
        };

        info!(
            client_id = %config.client.id,
            broker = %transport.endpoint,
            keepalive_secs = config.broker.keepalive_secs,
            "Connecting to MQTT broker"
        );

        let timeout = Duration::from_secs(config.broker.connect_timeout_secs);
        let span = crate::mqtt_span!(operation = "connect", broker = %config.endpoint());
        let connack = tokio::time::timeout(timeout, transport.wait_for_connack())
            .instrument(span)
            .await;
        connack.map_err(|_| {
            MqttError::ConnectionFailedStr(format!(
                "no CONNACK from {} within {}s",
                config.endpoint(),
                timeout.as_secs()
            ))
        })??;

        Ok(transport)
    }

    /// Broker address this transport is connected to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn wait_for_connack(&mut self) -> Result<(), MqttError> {
        loop {
            match self.event_loop.poll().await {
                Ok(event) => {
                    let route = MessageHandler::route_mqtt_event(&event);
                    match route.into_transport_event() {
                        Some(TransportEvent::Connected(code)) => {
                            self.pending.push_back(TransportEvent::Connected(code));
                            return Ok(());
                        }
                        Some(other) => self.pending.push_back(other),
                        None => trace!(target: "mqtt_transport", "MQTT event: {:?}", event),
                    }
                }
                Err(error) => {
                    if let Some(code) = self.park_if_refused(&error) {
                        self.pending.push_back(TransportEvent::Connected(code));
                        return Ok(());
                    }
                    return Err(Self::classify_error(error));
                }
            }
        }
    }

    /// A refused connection is not retried: the transport parks and the
    /// event loop is never polled again, which would otherwise reconnect.
    fn park_if_refused(&mut self, error: &ConnectionError) -> Option<ConnectReturnCode> {
        let code = MessageHandler::refused_connection_code(error)?;
        warn!(
            broker = %self.endpoint,
            result_code = code.code(),
            "Broker refused the connection: {}", code
        );
        self.refused = Some(code);
        Some(code)
    }

    fn classify_error(error: ConnectionError) -> MqttError {
        match error {
            ConnectionError::NotConnAck(packet) => {
                MqttError::ProtocolError(format!("expected CONNACK, received {packet:?}"))
            }
            other => MqttError::ConnectionFailed(other),
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    type Error = MqttError;

    async fn subscribe(&mut self, subscription: &Subscription) -> Result<(), Self::Error> {
        if let Some(code) = self.refused {
            return Err(MqttError::NotConnected(code));
        }

        self.client
            .subscribe(subscription.topic.clone(), subscription.qos)
            .await
            .map_err(MqttError::SubscriptionFailed)?;

        debug!(target: "mqtt_transport", topic = %subscription.topic, "Subscribe request queued");
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<TransportEvent>, Self::Error> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        if self.refused.is_some() {
            debug!(target: "mqtt_transport", "Connection refused, waiting without reconnecting");
            return std::future::pending().await;
        }

        loop {
            match self.event_loop.poll().await {
                Ok(event) => {
                    let route = MessageHandler::route_mqtt_event(&event);
                    match route.into_transport_event() {
                        Some(transport_event) => return Ok(Some(transport_event)),
                        None => trace!(target: "mqtt_transport", "MQTT event: {:?}", event),
                    }
                }
                Err(ConnectionError::RequestsDone) => return Ok(None),
                Err(error) => {
                    if let Some(code) = self.park_if_refused(&error) {
                        return Ok(Some(TransportEvent::Connected(code)));
                    }
                    return Err(Self::classify_error(error));
                }
            }
        }
    }
}

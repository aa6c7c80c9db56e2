//! Pure routing of rumqttc events
//!
//! This module turns raw rumqttc events and connection errors into the
//! transport-neutral events the session understands. Packets the session
//! has no use for (pings, outgoing acks) are classified but not forwarded.

use super::connection::map_return_code;
use crate::transport::{ConnectReturnCode, InboundMessage, TransportEvent};
use rumqttc::{ConnectionError, Event, Packet, SubscribeReasonCode};

/// SUBACK return code for a rejected subscription
pub const SUBACK_FAILURE: u8 = 0x80;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => {
                    EventRoute::ConnectionAcknowledged(map_return_code(&connack.code))
                }
                Packet::Publish(publish) => EventRoute::MessageReceived(InboundMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.clone(),
                    qos: publish.qos,
                    retain: publish.retain,
                }),
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    return_codes: suback
                        .return_codes
                        .iter()
                        .map(Self::suback_code)
                        .collect(),
                },
                Packet::Disconnect => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// A refused CONNACK surfaces from rumqttc as an error rather than an
    /// event; recover the return code so it can reach the callback.
    pub fn refused_connection_code(error: &ConnectionError) -> Option<ConnectReturnCode> {
        match error {
            ConnectionError::ConnectionRefused(code) => Some(map_return_code(code)),
            _ => None,
        }
    }

    /// Validate subscription success from SubAck (pure function)
    pub fn validate_subscription_success(return_codes: &[u8]) -> Result<(), String> {
        if return_codes.iter().any(|&code| code >= SUBACK_FAILURE) {
            Err(format!(
                "Subscription failed with return codes: {return_codes:?}"
            ))
        } else {
            Ok(())
        }
    }

    fn suback_code(code: &SubscribeReasonCode) -> u8 {
        match code {
            SubscribeReasonCode::Success(qos) => *qos as u8,
            SubscribeReasonCode::Failure => SUBACK_FAILURE,
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// CONNACK received with the broker's return code
    ConnectionAcknowledged(ConnectReturnCode),
    /// Message received on subscribed topic
    MessageReceived(InboundMessage),
    /// MQTT broker disconnected
    Disconnected,
    /// Subscription confirmed with return codes
    SubscriptionConfirmed {
        packet_id: u16,
        return_codes: Vec<u8>,
    },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

impl EventRoute {
    /// The event to hand to the session, if any
    pub fn into_transport_event(self) -> Option<TransportEvent> {
        match self {
            EventRoute::ConnectionAcknowledged(code) => Some(TransportEvent::Connected(code)),
            EventRoute::MessageReceived(message) => Some(TransportEvent::Message(message)),
            EventRoute::Disconnected => Some(TransportEvent::Disconnected),
            EventRoute::SubscriptionConfirmed {
                packet_id,
                return_codes,
            } => Some(TransportEvent::SubscriptionAcknowledged {
                packet_id,
                return_codes,
            }),
            EventRoute::InfrastructureEvent(_) | EventRoute::OutgoingEvent => None,
        }
    }
}

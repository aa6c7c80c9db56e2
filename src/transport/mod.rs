//! Transport layer for the subscriber session
//!
//! This module provides the transport abstraction the session polls and the
//! rumqttc-backed MQTT implementation. The trait is the seam that lets tests
//! drive the session with a scripted transport.

use crate::session::Subscription;
use bytes::Bytes;
use rumqttc::QoS;
use std::fmt;

pub mod mqtt;

/// Transport trait for a single subscriber connection
#[async_trait::async_trait]
pub trait Transport: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Request a subscription for the given topic filter
    async fn subscribe(&mut self, subscription: &Subscription) -> Result<(), Self::Error>;

    /// Wait for the next event the session needs to act on.
    ///
    /// Returns `Ok(None)` when the transport has ended and will produce no
    /// further events.
    async fn next_event(&mut self) -> Result<Option<TransportEvent>, Self::Error>;
}

/// Events surfaced by a transport, in delivery order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A CONNACK arrived, successful or not
    Connected(ConnectReturnCode),
    /// A PUBLISH arrived on a subscribed topic
    Message(InboundMessage),
    /// The broker answered a SUBSCRIBE
    SubscriptionAcknowledged { packet_id: u16, return_codes: Vec<u8> },
    /// The broker closed the session
    Disconnected,
}

/// One received publish
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }
}

/// MQTT 3.1.1 CONNACK return code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    Accepted,
    RefusedProtocolVersion,
    BadClientId,
    ServiceUnavailable,
    BadUserNamePassword,
    NotAuthorized,
    /// Reserved values a non-compliant broker might still send
    Other(u8),
}

impl ConnectReturnCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Accepted,
            1 => Self::RefusedProtocolVersion,
            2 => Self::BadClientId,
            3 => Self::ServiceUnavailable,
            4 => Self::BadUserNamePassword,
            5 => Self::NotAuthorized,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Accepted => 0,
            Self::RefusedProtocolVersion => 1,
            Self::BadClientId => 2,
            Self::ServiceUnavailable => 3,
            Self::BadUserNamePassword => 4,
            Self::NotAuthorized => 5,
            Self::Other(code) => *code,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Accepted => "connection accepted",
            Self::RefusedProtocolVersion => "unacceptable protocol version",
            Self::BadClientId => "identifier rejected",
            Self::ServiceUnavailable => "server unavailable",
            Self::BadUserNamePassword => "bad user name or password",
            Self::NotAuthorized => "not authorized",
            Self::Other(_) => "reserved return code",
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// Type alias for the MQTT transport
pub type MqttTransport = mqtt::MqttTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_round_trip_for_defined_codes() {
        for code in 0..=5u8 {
            assert_eq!(ConnectReturnCode::from_code(code).code(), code);
        }
        assert_eq!(ConnectReturnCode::from_code(42), ConnectReturnCode::Other(42));
    }

    #[test]
    fn test_only_zero_is_accepted() {
        assert!(ConnectReturnCode::from_code(0).is_accepted());
        assert!(!ConnectReturnCode::NotAuthorized.is_accepted());
        assert!(!ConnectReturnCode::Other(0x80).is_accepted());
    }

    #[test]
    fn test_return_code_display() {
        assert_eq!(
            ConnectReturnCode::NotAuthorized.to_string(),
            "5 (not authorized)"
        );
        assert_eq!(
            ConnectReturnCode::Accepted.to_string(),
            "0 (connection accepted)"
        );
    }

    #[test]
    fn test_inbound_message_defaults() {
        let message = InboundMessage::new("/vvm/visitorcounter/lobby", "42");
        assert_eq!(message.payload, Bytes::from_static(b"42"));
        assert_eq!(message.qos, QoS::AtMostOnce);
        assert!(!message.retain);
    }
}

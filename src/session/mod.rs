//! Subscriber session
//!
//! A [`Session`] owns exactly one connection handle and one callback owner.
//! [`Session::run`] polls the transport and dispatches each event to the
//! callbacks before polling again, until shutdown is requested or the
//! transport ends.
//!
//! ```rust
//! use mqtt_testclient::session::{PrintSubscriber, Session, Subscription, TerminationReason};
//! use mqtt_testclient::testing::MockTransport;
//! use rumqttc::QoS;
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new()
//!     .connack(0)
//!     .message("/vvm/visitorcounter/lobby", "42");
//! let handler = PrintSubscriber::new(
//!     Subscription::new("/vvm/visitorcounter/#", QoS::AtMostOnce),
//!     Vec::new(),
//! );
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let mut session = Session::new(transport, handler);
//! let reason = session.run(shutdown_rx).await;
//!
//! assert_eq!(reason, TerminationReason::TransportClosed);
//! let (_, handler) = session.into_parts();
//! assert_eq!(handler.into_sink(), b"/vvm/visitorcounter/lobby 42\n");
//! # });
//! ```

pub mod handler;

pub use handler::{format_line, OnConnected, OnMessage, PrintSubscriber};

use crate::protocol::matches_filter;
use crate::transport::mqtt::MessageHandler;
use crate::transport::{ConnectReturnCode, InboundMessage, Transport, TransportEvent};
use rumqttc::QoS;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// A topic filter and the QoS requested for it
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub topic: String,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            qos,
        }
    }
}

/// Session lifecycle as observed through transport events
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Connection handle created, CONNACK not yet dispatched
    Connecting,
    /// CONNACK accepted, subscribe request in flight (if any)
    Connected,
    /// Broker acknowledged the subscription
    Subscribed,
    /// Broker refused the connection; nothing further happens
    Refused(ConnectReturnCode),
    /// Transport ended
    Disconnected,
}

/// Why [`Session::run`] returned
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationReason {
    /// Shutdown was requested (signal received)
    Interrupted,
    /// The transport ended or the broker closed the session
    TransportClosed,
    /// The transport failed and cannot continue
    TransportFailed(String),
}

impl TerminationReason {
    /// Only an interrupt counts as a clean exit
    pub fn is_clean(&self) -> bool {
        matches!(self, TerminationReason::Interrupted)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Interrupted => write!(f, "interrupted"),
            TerminationReason::TransportClosed => write!(f, "transport closed"),
            TerminationReason::TransportFailed(reason) => write!(f, "transport failed: {reason}"),
        }
    }
}

enum Polled<E> {
    Shutdown,
    ShutdownChannelClosed,
    Event(Result<Option<TransportEvent>, E>),
}

/// One long-lived subscriber session over a single connection handle
pub struct Session<T, H> {
    transport: T,
    handler: H,
    state: SessionState,
    active: Option<Subscription>,
}

impl<T, H> Session<T, H>
where
    T: Transport,
    H: OnConnected + OnMessage,
{
    pub fn new(transport: T, handler: H) -> Self {
        Self {
            transport,
            handler,
            state: SessionState::Connecting,
            active: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The subscription most recently requested on an accepted connection
    pub fn active_subscription(&self) -> Option<&Subscription> {
        self.active.as_ref()
    }

    pub fn into_parts(self) -> (T, H) {
        (self.transport, self.handler)
    }

    /// Run the receive loop until shutdown is requested or the transport
    /// ends. A dropped shutdown sender means the loop can only end through
    /// the transport.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> TerminationReason {
        let mut shutdown_open = true;

        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, leaving receive loop");
                return TerminationReason::Interrupted;
            }

            let polled = tokio::select! {
                biased;

                changed = shutdown.changed(), if shutdown_open => match changed {
                    Ok(()) if *shutdown.borrow() => Polled::Shutdown,
                    Ok(()) => continue,
                    Err(_) => Polled::ShutdownChannelClosed,
                },
                event = self.transport.next_event() => Polled::Event(event),
            };

            match polled {
                Polled::Shutdown => {
                    info!("Shutdown requested, leaving receive loop");
                    return TerminationReason::Interrupted;
                }
                Polled::ShutdownChannelClosed => {
                    debug!("Shutdown channel closed, running until the transport ends");
                    shutdown_open = false;
                }
                Polled::Event(Ok(Some(event))) => {
                    if let Some(reason) = self.dispatch(event).await {
                        self.state = SessionState::Disconnected;
                        return reason;
                    }
                }
                Polled::Event(Ok(None)) => {
                    info!("Transport ended");
                    self.state = SessionState::Disconnected;
                    return TerminationReason::TransportClosed;
                }
                Polled::Event(Err(e)) => {
                    error!("Transport failure: {}", e);
                    self.state = SessionState::Disconnected;
                    return TerminationReason::TransportFailed(e.to_string());
                }
            }
        }
    }

    /// Handle one event; returns a termination reason if the loop must end
    async fn dispatch(&mut self, event: TransportEvent) -> Option<TerminationReason> {
        match event {
            TransportEvent::Connected(code) => self.handle_connected(code).await,
            TransportEvent::Message(message) => {
                self.handle_message(&message);
                None
            }
            TransportEvent::SubscriptionAcknowledged {
                packet_id,
                return_codes,
            } => {
                match MessageHandler::validate_subscription_success(&return_codes) {
                    Ok(()) => {
                        debug!(packet_id, ?return_codes, "Subscription confirmed");
                        if self.state == SessionState::Connected {
                            self.state = SessionState::Subscribed;
                        }
                    }
                    Err(e) => warn!(packet_id, "{}", e),
                }
                None
            }
            TransportEvent::Disconnected => {
                warn!("Broker closed the session");
                Some(TerminationReason::TransportClosed)
            }
        }
    }

    async fn handle_connected(&mut self, code: ConnectReturnCode) -> Option<TerminationReason> {
        let requested = self.handler.on_connected(code);

        if !code.is_accepted() {
            warn!(result_code = code.code(), "Connection refused: {}", code);
            self.state = SessionState::Refused(code);
            return None;
        }

        self.state = SessionState::Connected;
        let Some(subscription) = requested else {
            return None;
        };

        info!(topic = %subscription.topic, qos = ?subscription.qos, "Subscribing");
        if let Err(e) = self.transport.subscribe(&subscription).await {
            error!(topic = %subscription.topic, "Subscribe request failed: {}", e);
            return Some(TerminationReason::TransportFailed(e.to_string()));
        }
        self.active = Some(subscription);
        None
    }

    fn handle_message(&mut self, message: &InboundMessage) {
        let matched = self
            .active
            .as_ref()
            .is_some_and(|s| matches_filter(&s.topic, &message.topic));

        if !matched {
            debug!(topic = %message.topic, "Dropping message outside the active subscription");
            return;
        }

        debug!(
            topic = %message.topic,
            bytes = message.payload.len(),
            retain = message.retain,
            "Message received"
        );
        self.handler.on_message(message);
    }
}

//! Mock implementations for testing
//!
//! Provides a scripted transport and a shared output sink so the subscriber
//! session can be driven deterministically without a broker.

use crate::session::Subscription;
use crate::transport::mqtt::MqttError;
use crate::transport::{ConnectReturnCode, InboundMessage, Transport, TransportEvent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// What the mock does once its scripted events run out
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AfterScript {
    /// Report the transport as ended
    #[default]
    Close,
    /// Wait forever, like a live connection with no traffic
    Hold,
    /// Fail with the given message
    Fail(String),
}

/// Mock transport replaying scripted events
#[derive(Debug, Default)]
pub struct MockTransport {
    events: VecDeque<TransportEvent>,
    after_script: AfterScript,
    subscriptions: Vec<Subscription>,
    fail_subscribe: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: TransportEvent) -> Self {
        self.events.push_back(event);
        self
    }

    /// Queue a CONNACK with the given return code
    pub fn connack(self, code: u8) -> Self {
        self.with_event(TransportEvent::Connected(ConnectReturnCode::from_code(code)))
    }

    /// Queue an inbound message
    pub fn message(self, topic: &str, payload: impl Into<bytes::Bytes>) -> Self {
        self.with_event(TransportEvent::Message(InboundMessage::new(topic, payload)))
    }

    /// Queue a SUBACK with the given return codes
    pub fn suback(self, return_codes: Vec<u8>) -> Self {
        self.with_event(TransportEvent::SubscriptionAcknowledged {
            packet_id: 1,
            return_codes,
        })
    }

    pub fn hold_open(mut self) -> Self {
        self.after_script = AfterScript::Hold;
        self
    }

    pub fn failing_with(mut self, reason: &str) -> Self {
        self.after_script = AfterScript::Fail(reason.to_string());
        self
    }

    pub fn with_subscribe_failure(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Subscribe requests received so far, in order
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn remaining_events(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MqttError;

    async fn subscribe(&mut self, subscription: &Subscription) -> Result<(), Self::Error> {
        if self.fail_subscribe {
            return Err(MqttError::ConnectionFailedStr(
                "Mock subscribe failure".to_string(),
            ));
        }
        self.subscriptions.push(subscription.clone());
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<TransportEvent>, Self::Error> {
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }

        match &self.after_script {
            AfterScript::Close => Ok(None),
            AfterScript::Hold => std::future::pending().await,
            AfterScript::Fail(reason) => Err(MqttError::ConnectionFailedStr(reason.clone())),
        }
    }
}

/// Cloneable in-memory output sink
#[derive(Debug, Clone, Default)]
pub struct SharedSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Written output as lossy UTF-8 lines
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.contents())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink lock poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

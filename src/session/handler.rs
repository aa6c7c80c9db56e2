//! Session callbacks and the default print subscriber
//!
//! The two capability traits replace late-bound callback fields: whatever
//! owns the session implements them, and the session calls them
//! synchronously from its receive loop.

use super::Subscription;
use crate::transport::{ConnectReturnCode, InboundMessage};
use std::io::{self, Write};
use tracing::{info, warn};

/// Invoked once per connection attempt with the broker's return code.
///
/// Returning a subscription asks the session to subscribe; the session only
/// honours it when the connection was accepted.
pub trait OnConnected {
    fn on_connected(&mut self, code: ConnectReturnCode) -> Option<Subscription>;
}

/// Invoked once per inbound message that matches the active subscription.
/// Implementations must not fail; they run inside the receive loop.
pub trait OnMessage {
    fn on_message(&mut self, message: &InboundMessage);
}

/// Render a message as `<topic> <payload>\n` without touching payload bytes
pub fn format_line(message: &InboundMessage) -> Vec<u8> {
    let mut line = Vec::with_capacity(message.topic.len() + message.payload.len() + 2);
    line.extend_from_slice(message.topic.as_bytes());
    line.push(b' ');
    line.extend_from_slice(&message.payload);
    line.push(b'\n');
    line
}

/// Subscribes to one filter and prints every message to a sink
pub struct PrintSubscriber<W: Write> {
    subscription: Subscription,
    sink: W,
    printed: u64,
}

impl PrintSubscriber<io::Stdout> {
    pub fn stdout(subscription: Subscription) -> Self {
        Self::new(subscription, io::stdout())
    }
}

impl<W: Write> PrintSubscriber<W> {
    pub fn new(subscription: Subscription, sink: W) -> Self {
        Self {
            subscription,
            sink,
            printed: 0,
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Number of lines written so far
    pub fn printed(&self) -> u64 {
        self.printed
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    fn write_line(&mut self, message: &InboundMessage) -> io::Result<()> {
        self.sink.write_all(&format_line(message))?;
        self.sink.flush()
    }
}

impl<W: Write> OnConnected for PrintSubscriber<W> {
    fn on_connected(&mut self, code: ConnectReturnCode) -> Option<Subscription> {
        info!(result_code = code.code(), "Connected with result code {}", code.code());
        if code.is_accepted() {
            Some(self.subscription.clone())
        } else {
            None
        }
    }
}

impl<W: Write> OnMessage for PrintSubscriber<W> {
    fn on_message(&mut self, message: &InboundMessage) {
        match self.write_line(message) {
            Ok(()) => self.printed += 1,
            Err(e) => warn!(topic = %message.topic, "Failed to write message to output: {}", e),
        }
    }
}

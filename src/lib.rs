//! MQTT Test Client
//!
//! Connects to an MQTT broker, subscribes to one topic filter, and prints
//! every received message to standard output as `<topic> <payload>`.
//!
//! # Overview
//!
//! - [`config`] - Defaults, TOML file and command-line overrides
//! - [`transport`] - The `Transport` seam and the rumqttc connection handle
//! - [`session`] - The receive loop and the `OnConnected` / `OnMessage` callbacks
//! - [`protocol`] - Topic filter validation and matching
//! - [`observability`] - Logging setup
//! - [`testing`] - Scripted transport and in-memory sink
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mqtt_testclient::config::ClientConfig;
//! use mqtt_testclient::session::{PrintSubscriber, Session};
//! use mqtt_testclient::transport::MqttTransport;
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig::default();
//! let transport = MqttTransport::connect(&config).await?;
//! let handler = PrintSubscriber::stdout(config.subscription()?);
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let reason = Session::new(transport, handler).run(shutdown_rx).await;
//! println!("session ended: {reason}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod testing;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use session::{Session, SessionState, Subscription, TerminationReason};
pub use transport::{ConnectReturnCode, InboundMessage, Transport, TransportEvent};

//! rumqttc-backed MQTT transport
//!
//! The module separates pure functions from I/O operations:
//!
//! - [`connection`] - Option building, return-code mapping and errors
//! - [`message_handler`] - Pure routing of rumqttc events
//! - [`client`] - The connection handle that polls the event loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqtt_testclient::config::ClientConfig;
//! use mqtt_testclient::transport::mqtt::MqttTransport;
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig::default();
//! let transport = MqttTransport::connect(&config).await?;
//! println!("connected to {}", transport.endpoint());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttTransport;
pub use connection::{configure_mqtt_options, map_return_code, MqttError};
pub use message_handler::{EventRoute, MessageHandler};

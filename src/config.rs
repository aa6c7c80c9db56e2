//! Configuration for the MQTT test client
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then command-line overrides. Credentials are passed through unvalidated;
//! only the broker address, topic filter and QoS are checked, because the
//! transport cannot be built without them.

use crate::protocol::validate_filter;
use crate::session::Subscription;
use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CLIENT_ID: &str = "vvmweb";
pub const DEFAULT_TOPIC_FILTER: &str = "/vvm/visitorcounter/#";
pub const DEFAULT_PORT: u16 = 1883;
/// Largest packet accepted in either direction; MQTT caps a packet at 256 MiB
pub const DEFAULT_MAX_PACKET_SIZE: usize = 256 * 1024 * 1024;

const REDACTED: &str = "***";

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub subscription: SubscriptionSection,
}

/// Session identity sent in the CONNECT packet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// Client identifier in the broker's session table
    #[serde(default = "default_client_id")]
    pub id: String,
    pub username: Option<String>,
    /// Plaintext password (prefer `password_env`)
    pub password: Option<String>,
    /// Environment variable containing the password
    pub password_env: Option<String>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            id: default_client_id(),
            username: None,
            password: None,
            password_env: None,
        }
    }
}

/// Broker address and connection timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// `mqtt://host[:port]`; when present it overrides `host` and `port`
    pub url: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Keepalive interval in seconds (default: 60)
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// How long to wait for the CONNACK (default: 10)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Largest packet in bytes the client sends or accepts
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            port: default_port(),
            keepalive_secs: default_keepalive(),
            connect_timeout_secs: default_connect_timeout(),
            max_packet_size: default_max_packet_size(),
        }
    }
}

/// The single topic filter this client subscribes to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionSection {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub qos: u8,
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            qos: 0,
        }
    }
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_keepalive() -> u16 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_packet_size() -> usize {
    DEFAULT_MAX_PACKET_SIZE
}

fn default_topic() -> String {
    DEFAULT_TOPIC_FILTER.to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid topic filter: {0}")]
    InvalidTopicFilter(#[from] crate::protocol::TopicError),
    #[error("Invalid QoS level {0}: must be 0, 1 or 2")]
    InvalidQos(u8),
    #[error("Maximum packet size must be greater than zero")]
    InvalidMaxPacketSize,
}

/// Values taken from the command line, applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub broker_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub keepalive_secs: Option<u16>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic: Option<String>,
    pub qos: Option<u8>,
}

impl ClientConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: ClientConfig = toml::from_str(content)?;
        config.resolve_broker_url()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides, then re-validate
    pub fn apply(&mut self, overrides: Overrides) -> Result<(), ConfigError> {
        if let Some(url) = overrides.broker_url {
            self.broker.url = Some(url);
            self.resolve_broker_url()?;
        }
        if let Some(host) = overrides.host {
            self.broker.host = host;
        }
        if let Some(port) = overrides.port {
            self.broker.port = port;
        }
        if let Some(keepalive) = overrides.keepalive_secs {
            self.broker.keepalive_secs = keepalive;
        }
        if let Some(id) = overrides.client_id {
            self.client.id = id;
        }
        if let Some(username) = overrides.username {
            self.client.username = Some(username);
        }
        if let Some(password) = overrides.password {
            self.client.password = Some(password);
            self.client.password_env = None;
        }
        if let Some(topic) = overrides.topic {
            self.subscription.topic = topic;
        }
        if let Some(qos) = overrides.qos {
            self.subscription.qos = qos;
        }
        self.validate()
    }

    fn resolve_broker_url(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = self.broker.url.take() {
            let (host, port) = parse_broker_url(&url)?;
            self.broker.host = host;
            self.broker.port = port;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.is_empty() {
            return Err(ConfigError::InvalidBrokerUrl(
                "broker host cannot be empty".to_string(),
            ));
        }
        if self.broker.max_packet_size == 0 {
            return Err(ConfigError::InvalidMaxPacketSize);
        }
        validate_filter(&self.subscription.topic)?;
        qos_from_level(self.subscription.qos)?;
        Ok(())
    }

    /// Resolve the password, reading `password_env` if configured
    pub fn password(&self) -> Result<Option<String>, ConfigError> {
        match &self.client.password_env {
            Some(name) => std::env::var(name)
                .map(Some)
                .map_err(|_| ConfigError::EnvVarNotFound(name.clone())),
            None => Ok(self.client.password.clone()),
        }
    }

    pub fn subscription(&self) -> Result<Subscription, ConfigError> {
        Ok(Subscription::new(
            self.subscription.topic.clone(),
            qos_from_level(self.subscription.qos)?,
        ))
    }

    /// `host:port` for log fields
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.broker.host, self.broker.port)
    }

    /// Copy of this configuration with the plaintext password masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.client.password.is_some() {
            copy.client.password = Some(REDACTED.to_string());
        }
        copy
    }
}

/// Parse `mqtt://host[:port]` into host and port. TLS schemes are rejected.
pub fn parse_broker_url(broker_url: &str) -> Result<(String, u16), ConfigError> {
    let url =
        Url::parse(broker_url).map_err(|_| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;

    match url.scheme() {
        "mqtt" | "tcp" => {}
        scheme => {
            return Err(ConfigError::InvalidBrokerUrl(format!(
                "unsupported scheme '{scheme}' in {broker_url}"
            )))
        }
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;
    let port = url.port().unwrap_or(DEFAULT_PORT);

    Ok((host.to_string(), port))
}

pub fn qos_from_level(level: u8) -> Result<QoS, ConfigError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(ConfigError::InvalidQos(other)),
    }
}

//! Pure connection configuration for the MQTT transport
//!
//! This module contains pure functions that turn the client configuration
//! into rumqttc options, plus the transport error type.

use crate::config::ClientConfig;
use crate::transport::ConnectReturnCode;
use rumqttc::ConnectReturnCode as RumqttcReturnCode;
use rumqttc::MqttOptions;
use std::time::Duration;
use thiserror::Error;

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] rumqttc::ConnectionError),
    #[error("Connection failed: {0}")]
    ConnectionFailedStr(String),
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(#[source] rumqttc::ClientError),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    #[error("Not connected - broker refused the connection with code {0}")]
    NotConnected(ConnectReturnCode),
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Pure function to configure MQTT options from config.
///
/// Client id and credentials are forwarded exactly as configured: a username
/// without a password is sent with an empty password.
pub fn configure_mqtt_options(config: &ClientConfig) -> Result<MqttOptions, MqttError> {
    let mut mqtt_options = MqttOptions::new(
        config.client.id.clone(),
        config.broker.host.clone(),
        config.broker.port,
    );

    mqtt_options.set_keep_alive(Duration::from_secs(u64::from(config.broker.keepalive_secs)));
    // rumqttc rejects an empty client id without a clean session
    mqtt_options.set_clean_session(true);
    // rumqttc drops the connection on anything above its 10 KiB default
    let max_packet_size = config.broker.max_packet_size;
    mqtt_options.set_max_packet_size(max_packet_size, max_packet_size);

    if let Some(username) = &config.client.username {
        let password = config.password()?.unwrap_or_default();
        mqtt_options.set_credentials(username.clone(), password);
    }

    Ok(mqtt_options)
}

/// Map rumqttc's CONNACK code onto the transport-neutral one
pub fn map_return_code(code: &RumqttcReturnCode) -> ConnectReturnCode {
    match code {
        RumqttcReturnCode::Success => ConnectReturnCode::Accepted,
        RumqttcReturnCode::RefusedProtocolVersion => ConnectReturnCode::RefusedProtocolVersion,
        RumqttcReturnCode::BadClientId => ConnectReturnCode::BadClientId,
        RumqttcReturnCode::ServiceUnavailable => ConnectReturnCode::ServiceUnavailable,
        RumqttcReturnCode::BadUserNamePassword => ConnectReturnCode::BadUserNamePassword,
        RumqttcReturnCode::NotAuthorized => ConnectReturnCode::NotAuthorized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_PACKET_SIZE;

    fn test_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.broker.host = "broker-hostname".to_string();
        config
    }

    #[test]
    fn test_configure_mqtt_options() {
        let options = configure_mqtt_options(&test_config()).unwrap();
        assert_eq!(options.client_id(), "vvmweb");
        assert_eq!(
            options.broker_address(),
            ("broker-hostname".to_string(), 1883)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert!(options.credentials().is_none());
    }

    #[test]
    fn test_credentials_forwarded() {
        let mut config = test_config();
        config.client.username = Some("username".to_string());
        config.client.password = Some("password".to_string());

        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(
            options.credentials(),
            Some(("username".to_string(), "password".to_string()))
        );
    }

    #[test]
    fn test_username_without_password_sends_empty_password() {
        let mut config = test_config();
        config.client.username = Some(String::new());

        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.credentials(), Some((String::new(), String::new())));
    }

    #[test]
    fn test_client_id_passed_through_unvalidated() {
        let mut config = test_config();
        config.client.id = String::new();
        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.client_id(), "");
        assert!(options.clean_session());

        config.client.id = " padded".to_string();
        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.client_id(), " padded");
    }

    #[test]
    fn test_max_packet_size_applied() {
        let mut config = test_config();
        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.max_packet_size(), DEFAULT_MAX_PACKET_SIZE);

        config.broker.max_packet_size = 64 * 1024;
        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.max_packet_size(), 64 * 1024);
    }

    #[test]
    fn test_map_return_code() {
        assert_eq!(
            map_return_code(&RumqttcReturnCode::Success),
            ConnectReturnCode::Accepted
        );
        assert_eq!(map_return_code(&RumqttcReturnCode::NotAuthorized).code(), 5);
        assert_eq!(
            map_return_code(&RumqttcReturnCode::BadUserNamePassword).code(),
            4
        );
    }

    #[test]
    fn test_mqtt_error_display() {
        let errors = vec![
            MqttError::ConnectionFailedStr("test".to_string()),
            MqttError::ProtocolError("test".to_string()),
            MqttError::NotConnected(ConnectReturnCode::NotAuthorized),
        ];

        for error in errors {
            let error_string = error.to_string();
            assert!(!error_string.is_empty());
        }
    }
}

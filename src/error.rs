//! Crate-level error type
//!
//! Every failure the client can surface before the receive loop starts:
//! configuration problems and transport failures.

use crate::config::ConfigError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Main error type for test client operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] MqttError),
}

/// Result type for test client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectReturnCode;

    #[test]
    fn test_config_error_conversion() {
        let error: ClientError = ConfigError::InvalidQos(7).into();
        assert!(matches!(error, ClientError::Config(_)));
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid QoS level 7: must be 0, 1 or 2"
        );
    }

    #[test]
    fn test_transport_error_conversion() {
        let error: ClientError = MqttError::NotConnected(ConnectReturnCode::NotAuthorized).into();
        assert!(matches!(error, ClientError::Transport(_)));
        assert!(error.to_string().contains("5 (not authorized)"));
    }
}

//! Error types for ib-core

use thiserror::Error;

/// Result type alias for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Broker error types
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Connection to gateway failed: {0}")]
    ConnectFailed(String),

    #[error("Broker session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Gateway closed the connection")]
    ConnectionDropped,

    #[error("Gateway rejected request: {0}")]
    Rejected(String),

    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BrokerError {
    /// Whether this error means the underlying connection is gone and a
    /// reconnect is worth attempting.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            BrokerError::ConnectionDropped | BrokerError::IoError(_)
        )
    }
}

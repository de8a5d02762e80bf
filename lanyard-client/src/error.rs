//! Error types for the presence client.

use tokio_tungstenite::tungstenite;

/// Error types for gateway and configuration operations.
///
/// Nothing in the gateway event loop returns these to the consumer; they are
/// logged where they happen.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Transport error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    Closed,
}

pub type LinkResult<T> = Result<T, LinkError>;

impl From<tokio_tungstenite::tungstenite::Error> for LinkError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => LinkError::Closed,
            WsError::Url(e) => LinkError::InvalidUrl(e.to_string()),
            other => LinkError::WebSocket(other.to_string()),
        }
    }
}

impl From<toml::de::Error> for LinkError {
    fn from(error: toml::de::Error) -> Self {
        LinkError::Config(error.to_string())
    }
}

use serde::{Deserialize, Serialize};

/// Status carried by the locally generated `connection` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Error,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionUpdate {
    pub fn connected() -> Self {
        Self {
            status: ConnectionStatus::Connected,
            error: None,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            error: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Error,
            error: Some(detail.into()),
        }
    }
}

/// Lifecycle state of a connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// `close()` was requested; waiting for the live connection to wind down.
    Closing,
}

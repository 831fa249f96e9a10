//! Connection configuration
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Every field has a default so an empty file is valid.

use crate::errors::{LinkError, LinkResult};
use crate::identity::{ClientId, DEFAULT_CLIENT_ID_PREFIX};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "ws://localhost:8000/ws";
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3000;

pub const ENV_URL: &str = "OFFICE_LINK_URL";
pub const ENV_RECONNECT_MS: &str = "OFFICE_LINK_RECONNECT_MS";
pub const ENV_HEARTBEAT_MS: &str = "OFFICE_LINK_HEARTBEAT_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// `ws(s)://host/ws`; the client id is appended as the last segment.
    pub base_url: String,
    /// When set, `base_url` is derived from it and `secure`.
    pub host: Option<String>,
    pub secure: bool,
    /// Fixed delay before every reconnection attempt.
    pub reconnect_interval_ms: u64,
    /// Sends `{"type":"ping"}` at this interval while connected.
    pub heartbeat_interval_ms: Option<u64>,
    pub client_id_prefix: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            host: None,
            secure: false,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            heartbeat_interval_ms: None,
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_string(),
        }
    }
}

impl LinkConfig {
    pub fn for_host(host: impl Into<String>, secure: bool) -> Self {
        Self {
            host: Some(host.into()),
            secure,
            ..Self::default()
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("office-link").join("config.toml"))
    }

    pub fn load(path: &Path) -> LinkResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LinkError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: LinkConfig = toml::from_str(&raw)?;
        debug!("Loaded link config: path={}", path.display());
        Ok(config)
    }

    /// Explicit path if given, else the default location when it exists,
    /// else built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> LinkResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn apply_env_overrides(self) -> LinkResult<Self> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(mut self, lookup: F) -> LinkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.base_url = url;
            self.host = None;
        }
        if let Some(raw) = lookup(ENV_RECONNECT_MS) {
            self.reconnect_interval_ms = parse_millis(ENV_RECONNECT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_HEARTBEAT_MS) {
            self.heartbeat_interval_ms = Some(parse_millis(ENV_HEARTBEAT_MS, &raw)?);
        }
        Ok(self)
    }

    pub fn validate(&self) -> LinkResult<()> {
        let base = self.resolved_base_url();
        let Some(rest) = base
            .strip_prefix("wss://")
            .or_else(|| base.strip_prefix("ws://"))
        else {
            return Err(LinkError::InvalidUrl(format!(
                "Base address must use ws:// or wss://: {}",
                base
            )));
        };
        if rest.split('/').next().map_or(true, str::is_empty) {
            return Err(LinkError::InvalidUrl(format!("Base address has no host: {}", base)));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(LinkError::Config(
                "reconnect_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_interval_ms == Some(0) {
            return Err(LinkError::Config(
                "heartbeat_interval_ms must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resolved_base_url(&self) -> String {
        match &self.host {
            Some(host) => {
                let scheme = if self.secure { "wss" } else { "ws" };
                format!("{}://{}/ws", scheme, host.trim_end_matches('/'))
            }
            None => self.base_url.clone(),
        }
    }

    /// `<base>/<client id>`
    pub fn endpoint_for(&self, client_id: &ClientId) -> String {
        format!(
            "{}/{}",
            self.resolved_base_url().trim_end_matches('/'),
            urlencoding::encode(client_id.as_str())
        )
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval_ms.map(Duration::from_millis)
    }
}

fn parse_millis(key: &str, raw: &str) -> LinkResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| LinkError::Config(format!("Invalid {} '{}': expected milliseconds", key, raw)))
}

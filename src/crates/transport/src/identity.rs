//! Per-session client identity.
//!
//! The backend keys a socket by the last path segment of its address, so the
//! identity has to be unique across concurrently open sessions. It is not a
//! secret and carries no authority.

use rand::Rng;
use std::fmt;

pub const DEFAULT_CLIENT_ID_PREFIX: &str = "web";

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        Self::with_prefix(DEFAULT_CLIENT_ID_PREFIX)
    }

    /// `<prefix>-<unix millis>-<9 base36 chars>`
    pub fn with_prefix(prefix: &str) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("{}-{}-{}", prefix, millis, random_suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

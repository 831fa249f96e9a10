use crate::events::EventKind;
use crate::payloads::EventPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{event, data}` unit exchanged over the connection.
///
/// `data` is opaque to the transport and forwarded to subscribers as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_tag(&self.event)
    }

    /// Decodes `data` into the typed payload for `P::KIND`.
    pub fn payload<P: EventPayload>(&self) -> Result<P, serde_json::Error> {
        P::deserialize(&self.data)
    }
}

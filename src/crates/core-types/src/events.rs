use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Reserved tag for subscribers that want every inbound envelope.
pub const WILDCARD_TAG: &str = "*";

/// Semantic kind of an envelope, keyed by its `event` tag.
///
/// Tags the client does not know are kept verbatim in `Other` so they can
/// still be routed to subscribers registered under the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Locally generated connection status change.
    Connection,
    AgentMessage,
    AgentStatus,
    PhaseChange,
    /// Decision request that needs a human-selected option.
    BossDecision,
    FileUpdate,
    FileOutput,
    TaskComplete,
    ErrorAlert,
    ProjectComplete,
    /// Backend welcome frame sent right after the socket is accepted.
    Connected,
    Pong,
    Subscribed,
    Unsubscribed,
    DecisionSubmitted,
    /// Backend-side protocol error (e.g. it could not parse our command).
    Error,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Connection => "connection",
            EventKind::AgentMessage => "agent_message",
            EventKind::AgentStatus => "agent_status",
            EventKind::PhaseChange => "phase_change",
            EventKind::BossDecision => "boss_decision",
            EventKind::FileUpdate => "file_update",
            EventKind::FileOutput => "file_output",
            EventKind::TaskComplete => "task_complete",
            EventKind::ErrorAlert => "error_alert",
            EventKind::ProjectComplete => "project_complete",
            EventKind::Connected => "connected",
            EventKind::Pong => "pong",
            EventKind::Subscribed => "subscribed",
            EventKind::Unsubscribed => "unsubscribed",
            EventKind::DecisionSubmitted => "decision_submitted",
            EventKind::Error => "error",
            EventKind::Other(tag) => tag.as_str(),
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "connection" => EventKind::Connection,
            "agent_message" => EventKind::AgentMessage,
            "agent_status" => EventKind::AgentStatus,
            "phase_change" => EventKind::PhaseChange,
            "boss_decision" => EventKind::BossDecision,
            "file_update" => EventKind::FileUpdate,
            "file_output" => EventKind::FileOutput,
            "task_complete" => EventKind::TaskComplete,
            "error_alert" => EventKind::ErrorAlert,
            "project_complete" => EventKind::ProjectComplete,
            "connected" => EventKind::Connected,
            "pong" => EventKind::Pong,
            "subscribed" => EventKind::Subscribed,
            "unsubscribed" => EventKind::Unsubscribed,
            "decision_submitted" => EventKind::DecisionSubmitted,
            "error" => EventKind::Error,
            other => EventKind::Other(other.to_string()),
        }
    }

    /// Whether this is one of the tags the backend is known to emit.
    pub fn is_known(&self) -> bool {
        !matches!(self, EventKind::Other(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        EventKind::from_tag(tag)
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        EventKind::from_tag(&tag)
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(EventKind::from_tag(&tag))
    }
}

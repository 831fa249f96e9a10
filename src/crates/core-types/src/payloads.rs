//! Typed payloads for the event kinds the backend emits.
//!
//! The backend is loose about optional fields, so everything that is not
//! essential for routing carries `#[serde(default)]`.

use crate::connection::ConnectionUpdate;
use crate::events::EventKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A payload type bound to exactly one event kind.
pub trait EventPayload: DeserializeOwned + Serialize {
    const KIND: EventKind;
}

fn default_agent_status() -> String {
    "idle".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub from: String,
    pub to: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Message category (question, answer, handoff...).
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    #[serde(alias = "agentId")]
    pub agent_id: String,
    /// idle / working / thinking / waiting
    #[serde(default = "default_agent_status")]
    pub status: String,
    #[serde(default)]
    pub current_task: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseChange {
    #[serde(default)]
    pub project_id: Option<String>,
    pub new_phase: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub old_phase: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl PhaseChange {
    /// Delivery stage reached; the project output is worth showing.
    pub fn is_delivery(&self) -> bool {
        self.new_phase == "delivery" || self.new_phase == "completed" || self.progress >= 90.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossDecision {
    pub decision_id: String,
    #[serde(default)]
    pub agent_id: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub file_path: String,
    /// created / modified / deleted
    #[serde(default)]
    pub update_type: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutput {
    pub agent_id: String,
    pub file_path: String,
    /// document / code / config / asset
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskComplete {
    pub task_name: String,
    #[serde(default)]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAlert {
    pub error_message: String,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectComplete {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Welcome {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSubmitted {
    pub decision_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendError {
    #[serde(default)]
    pub message: String,
}

macro_rules! bind_payload {
    ($($payload:ty => $kind:expr),* $(,)?) => {
        $(impl EventPayload for $payload {
            const KIND: EventKind = $kind;
        })*
    };
}

bind_payload! {
    ConnectionUpdate => EventKind::Connection,
    AgentMessage => EventKind::AgentMessage,
    AgentStatus => EventKind::AgentStatus,
    PhaseChange => EventKind::PhaseChange,
    BossDecision => EventKind::BossDecision,
    FileUpdate => EventKind::FileUpdate,
    FileOutput => EventKind::FileOutput,
    TaskComplete => EventKind::TaskComplete,
    ErrorAlert => EventKind::ErrorAlert,
    ProjectComplete => EventKind::ProjectComplete,
    Welcome => EventKind::Connected,
    DecisionSubmitted => EventKind::DecisionSubmitted,
    BackendError => EventKind::Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agent_status_accepts_camel_case_id_and_defaults_status() {
        let status: AgentStatus = serde_json::from_value(json!({"agentId": "artist"})).unwrap();
        assert_eq!(status.agent_id, "artist");
        assert_eq!(status.status, "idle");
    }

    #[test]
    fn flat_backend_agent_message_keeps_extra_fields() {
        let raw = json!({
            "event": "agent_message",
            "project_id": "snake_20250101",
            "from": "pm",
            "to": "planner",
            "type": "task",
            "content": "Draft the level design",
            "context": "",
            "timestamp": "2025-01-01T10:00:00"
        });

        let message: AgentMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(message.from, "pm");
        assert_eq!(message.message_type.as_deref(), Some("task"));
        assert_eq!(message.project_id.as_deref(), Some("snake_20250101"));
    }

    #[test]
    fn phase_change_delivery_detection() {
        let mut phase: PhaseChange =
            serde_json::from_value(json!({"new_phase": "development", "progress": 40}))
                .unwrap();
        assert!(!phase.is_delivery());

        phase.progress = 92.5;
        assert!(phase.is_delivery());

        phase.progress = 10.0;
        phase.new_phase = "delivery".to_string();
        assert!(phase.is_delivery());
    }

    #[test]
    fn boss_decision_options_default_to_empty() {
        let decision: BossDecision = serde_json::from_value(json!({
            "decision_id": "d1",
            "question": "Ship it?"
        }))
        .unwrap();
        assert!(decision.options.is_empty());
        assert_eq!(BossDecision::KIND, EventKind::BossDecision);
    }
}

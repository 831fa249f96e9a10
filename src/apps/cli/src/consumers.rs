//! Console consumers of the event stream: activity log, connection badge
//! and the decision desk.

use office_transport::types::{
    AgentMessage, AgentStatus, BackendError, BossDecision, Command, ConnectionStatus, DecisionSubmitted,
    Envelope, ErrorAlert, EventKind, EventPayload, FileOutput, FileUpdate, PhaseChange,
    ProjectComplete, TaskComplete,
};
use std::collections::VecDeque;
use std::fmt;

const SUMMARY_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    Agent,
    Phase,
    Boss,
    System,
    Error,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Agent => "agent",
            LogTag::Phase => "phase",
            LogTag::Boss => "boss",
            LogTag::System => "system",
            LogTag::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub tag: LogTag,
    pub text: String,
}

impl LogEntry {
    fn new(tag: LogTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.tag.as_str(), self.text)
    }
}

fn summarize(text: &str) -> String {
    if text.chars().count() > SUMMARY_CHARS {
        let head: String = text.chars().take(SUMMARY_CHARS).collect();
        format!("{}…", head)
    } else {
        text.to_string()
    }
}

fn decode<P: EventPayload>(envelope: &Envelope) -> Option<P> {
    match envelope.payload::<P>() {
        Ok(payload) => Some(payload),
        Err(e) => {
            log::warn!(
                "Skipping event with unexpected payload: event={}, error={}",
                envelope.event,
                e
            );
            None
        }
    }
}

/// One activity line per inbound event, `None` for events that are not
/// worth a line (heartbeats, acknowledgements handled elsewhere).
pub fn describe(envelope: &Envelope) -> Option<LogEntry> {
    let entry = match envelope.kind() {
        EventKind::AgentMessage => {
            let message: AgentMessage = decode(envelope)?;
            LogEntry::new(
                LogTag::Agent,
                format!("{} → {}: {}", message.from, message.to, summarize(&message.content)),
            )
        }
        EventKind::AgentStatus => {
            let status: AgentStatus = decode(envelope)?;
            let mut text = format!("{} → {}", status.agent_id, status.status.to_uppercase());
            if !status.current_task.is_empty() {
                text.push_str(&format!(" ({})", summarize(&status.current_task)));
            }
            LogEntry::new(LogTag::Agent, text)
        }
        EventKind::PhaseChange => {
            let phase: PhaseChange = decode(envelope)?;
            let mut text = format!("Phase → {} ({:.0}%)", phase.new_phase, phase.progress);
            if phase.is_delivery() {
                text.push_str(", build ready to play");
            }
            LogEntry::new(LogTag::Phase, text)
        }
        EventKind::BossDecision => {
            let decision: BossDecision = decode(envelope)?;
            LogEntry::new(LogTag::Boss, format!("Decision needed: {}", decision.question))
        }
        EventKind::FileUpdate => {
            let update: FileUpdate = decode(envelope)?;
            LogEntry::new(LogTag::System, format!("File updated: {}", update.file_path))
        }
        EventKind::FileOutput => {
            let output: FileOutput = decode(envelope)?;
            let what = if output.summary.is_empty() {
                output.file_path
            } else {
                output.summary
            };
            LogEntry::new(LogTag::Agent, format!("{} produced: {}", output.agent_id, what))
        }
        EventKind::TaskComplete => {
            let task: TaskComplete = decode(envelope)?;
            LogEntry::new(LogTag::Phase, format!("✓ Task complete: {}", task.task_name))
        }
        EventKind::ErrorAlert => {
            let alert: ErrorAlert = decode(envelope)?;
            LogEntry::new(LogTag::Error, format!("Error: {}", alert.error_message))
        }
        EventKind::ProjectComplete => {
            let done: ProjectComplete = decode(envelope)?;
            let mut text = format!("Project complete: {}", done.message);
            if let Some(dir) = done.output_dir {
                text.push_str(&format!(" ({})", dir));
            }
            LogEntry::new(LogTag::Phase, text)
        }
        EventKind::DecisionSubmitted => {
            let ack: DecisionSubmitted = decode(envelope)?;
            LogEntry::new(LogTag::Boss, format!("Decision {} recorded", ack.decision_id))
        }
        EventKind::Error => {
            let failure: BackendError = decode(envelope)?;
            let message = if failure.message.is_empty() {
                "unknown backend error"
            } else {
                failure.message.as_str()
            };
            LogEntry::new(LogTag::Error, format!("Backend: {}", message))
        }
        EventKind::Other(tag) => LogEntry::new(LogTag::System, format!("Unhandled event: {}", tag)),
        EventKind::Connection
        | EventKind::Connected
        | EventKind::Pong
        | EventKind::Subscribed
        | EventKind::Unsubscribed => return None,
    };
    Some(entry)
}

pub fn badge(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connected => "● ONLINE",
        ConnectionStatus::Error | ConnectionStatus::Disconnected => "● OFFLINE",
    }
}

/// Decisions waiting for an answer, oldest first.
#[derive(Debug, Default)]
pub struct DecisionDesk {
    pending: VecDeque<BossDecision>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Choice(Command),
    Invalid(String),
    NothingPending,
}

impl DecisionDesk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `decision`; a repeated `decision_id` is ignored.
    pub fn push(&mut self, decision: BossDecision) -> bool {
        if self
            .pending
            .iter()
            .any(|pending| pending.decision_id == decision.decision_id)
        {
            return false;
        }
        self.pending.push_back(decision);
        true
    }

    pub fn current(&self) -> Option<&BossDecision> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn prompt(decision: &BossDecision) -> String {
        let mut prompt = format!("Decision from {}: {}", decision.agent_id, decision.question);
        for (index, option) in decision.options.iter().enumerate() {
            prompt.push_str(&format!("\n  {}) {}", index + 1, option));
        }
        if decision.options.is_empty() {
            prompt.push_str("\n  type your answer");
        }
        prompt
    }

    /// Turns a line of input into a response for the oldest decision. An
    /// option may be picked by number or by its exact text; free text is
    /// accepted only when the decision offers no options.
    pub fn answer(&self, input: &str) -> Answer {
        let Some(decision) = self.current() else {
            return Answer::NothingPending;
        };
        let input = input.trim();
        if input.is_empty() {
            return Answer::Invalid("empty answer".to_string());
        }

        let choice = if decision.options.is_empty() {
            Some(input.to_string())
        } else if let Ok(number) = input.parse::<usize>() {
            number
                .checked_sub(1)
                .and_then(|index| decision.options.get(index))
                .cloned()
        } else {
            decision.options.iter().find(|option| *option == input).cloned()
        };

        match choice {
            Some(choice) => Answer::Choice(Command::decision_response(
                decision.decision_id.clone(),
                choice,
            )),
            None => Answer::Invalid(format!(
                "pick 1-{} or type an option exactly",
                decision.options.len()
            )),
        }
    }

    /// Drops the oldest decision once its answer has been sent.
    pub fn resolve(&mut self) -> Option<BossDecision> {
        self.pending.pop_front()
    }

    /// Drops a decision the backend reports as settled elsewhere.
    pub fn settle(&mut self, decision_id: &str) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|pending| pending.decision_id != decision_id);
        before != self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decision(id: &str, options: &[&str]) -> BossDecision {
        serde_json::from_value(json!({
            "decision_id": id,
            "agent_id": "pm",
            "question": "Which art style?",
            "options": options,
        }))
        .unwrap()
    }

    #[test]
    fn agent_message_is_summarized() {
        let long = "x".repeat(80);
        let envelope = Envelope::new(
            "agent_message",
            json!({"from": "pm", "to": "artist", "content": long}),
        );
        let entry = describe(&envelope).unwrap();
        assert_eq!(entry.tag, LogTag::Agent);
        assert_eq!(entry.text, format!("pm → artist: {}…", "x".repeat(60)));
    }

    #[test]
    fn phase_change_mentions_delivery() {
        let envelope = Envelope::new(
            "phase_change",
            json!({"project_id": "p1", "new_phase": "delivery", "progress": 95}),
        );
        let entry = describe(&envelope).unwrap();
        assert_eq!(entry.to_string(), "[phase] Phase → delivery (95%), build ready to play");
    }

    #[test]
    fn heartbeats_and_unknown_events() {
        assert_eq!(describe(&Envelope::new("pong", json!({}))), None);
        let entry = describe(&Envelope::new("weather", json!({}))).unwrap();
        assert_eq!(entry.tag, LogTag::System);
        assert!(entry.text.contains("weather"));
    }

    #[test]
    fn backend_error_message_is_shown() {
        let entry = describe(&Envelope::new("error", json!({"message": "project not found"})));
        assert_eq!(
            entry.map(|entry| entry.to_string()),
            Some("[error] Backend: project not found".to_string())
        );
        let entry = describe(&Envelope::new("error", json!({}))).unwrap();
        assert_eq!(entry.text, "Backend: unknown backend error");
    }

    #[test]
    fn malformed_payload_is_skipped() {
        let envelope = Envelope::new("task_complete", json!({"unexpected": true}));
        assert_eq!(describe(&envelope), None);
    }

    #[test]
    fn badge_reflects_status() {
        assert_eq!(badge(ConnectionStatus::Connected), "● ONLINE");
        assert_eq!(badge(ConnectionStatus::Error), "● OFFLINE");
        assert_eq!(badge(ConnectionStatus::Disconnected), "● OFFLINE");
    }

    #[test]
    fn desk_answers_by_number_or_text() {
        let mut desk = DecisionDesk::new();
        assert_eq!(desk.answer("1"), Answer::NothingPending);

        assert!(desk.push(decision("d1", &["pixel", "vector"])));
        assert!(!desk.push(decision("d1", &["pixel", "vector"])));
        assert_eq!(desk.len(), 1);

        assert_eq!(
            desk.answer("2"),
            Answer::Choice(Command::decision_response("d1", "vector"))
        );
        assert_eq!(
            desk.answer(" pixel "),
            Answer::Choice(Command::decision_response("d1", "pixel"))
        );
        assert!(matches!(desk.answer("0"), Answer::Invalid(_)));
        assert!(matches!(desk.answer("3"), Answer::Invalid(_)));
        assert!(matches!(desk.answer("watercolor"), Answer::Invalid(_)));
        assert!(matches!(desk.answer("  "), Answer::Invalid(_)));
    }

    #[test]
    fn desk_accepts_free_text_without_options() {
        let mut desk = DecisionDesk::new();
        desk.push(decision("d2", &[]));
        assert_eq!(
            desk.answer("继续"),
            Answer::Choice(Command::decision_response("d2", "继续"))
        );
        assert!(DecisionDesk::prompt(desk.current().unwrap()).contains("type your answer"));
    }

    #[test]
    fn desk_resolves_in_order_and_settles_by_id() {
        let mut desk = DecisionDesk::new();
        desk.push(decision("d1", &["a"]));
        desk.push(decision("d2", &["b"]));
        desk.push(decision("d3", &["c"]));

        assert!(desk.settle("d2"));
        assert!(!desk.settle("d2"));
        assert_eq!(desk.resolve().map(|d| d.decision_id), Some("d1".to_string()));
        assert_eq!(desk.current().map(|d| d.decision_id.as_str()), Some("d3"));
        desk.resolve();
        assert!(desk.is_empty());
    }

    #[test]
    fn prompt_lists_numbered_options() {
        let prompt = DecisionDesk::prompt(&decision("d1", &["pixel", "vector"]));
        assert_eq!(
            prompt,
            "Decision from pm: Which art style?\n  1) pixel\n  2) vector"
        );
    }
}

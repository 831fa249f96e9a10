//! Outbound commands.
//!
//! The backend reads two families of commands: ones tagged by `type` and
//! project subscriptions tagged by `action`. They share one `Command` type so
//! callers never have to care which family a command belongs to.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Typed(TypedCommand),
    Action(ActionCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedCommand {
    /// Answer to a `boss_decision` request.
    BossDecisionResponse { decision_id: String, choice: String },
    /// Heartbeat; the backend replies with `pong`.
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionCommand {
    SubscribeProject { project_id: String },
    UnsubscribeProject { project_id: String },
}

impl Command {
    pub fn decision_response(decision_id: impl Into<String>, choice: impl Into<String>) -> Self {
        Command::Typed(TypedCommand::BossDecisionResponse {
            decision_id: decision_id.into(),
            choice: choice.into(),
        })
    }

    pub fn ping() -> Self {
        Command::Typed(TypedCommand::Ping)
    }

    pub fn subscribe_project(project_id: impl Into<String>) -> Self {
        Command::Action(ActionCommand::SubscribeProject {
            project_id: project_id.into(),
        })
    }

    pub fn unsubscribe_project(project_id: impl Into<String>) -> Self {
        Command::Action(ActionCommand::UnsubscribeProject {
            project_id: project_id.into(),
        })
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Typed(TypedCommand::BossDecisionResponse { .. }) => "boss_decision_response",
            Command::Typed(TypedCommand::Ping) => "ping",
            Command::Action(ActionCommand::SubscribeProject { .. }) => "subscribe_project",
            Command::Action(ActionCommand::UnsubscribeProject { .. }) => "unsubscribe_project",
        }
    }
}

impl From<TypedCommand> for Command {
    fn from(command: TypedCommand) -> Self {
        Command::Typed(command)
    }
}

impl From<ActionCommand> for Command {
    fn from(command: ActionCommand) -> Self {
        Command::Action(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decision_response_wire_shape() {
        let command = Command::decision_response("d1", "继续");
        assert_eq!(
            serde_json::to_string(&command).unwrap(),
            r#"{"type":"boss_decision_response","decision_id":"d1","choice":"继续"}"#
        );
    }

    #[test]
    fn subscription_commands_use_action_tag() {
        assert_eq!(
            serde_json::to_value(Command::subscribe_project("p-1")).unwrap(),
            json!({"action": "subscribe_project", "project_id": "p-1"})
        );
        assert_eq!(
            serde_json::to_value(Command::unsubscribe_project("p-1")).unwrap(),
            json!({"action": "unsubscribe_project", "project_id": "p-1"})
        );
        assert_eq!(
            serde_json::to_value(Command::ping()).unwrap(),
            json!({"type": "ping"})
        );
    }

    #[test]
    fn every_command_survives_a_text_round_trip() {
        let commands = vec![
            Command::decision_response("d-42", "再想想"),
            Command::ping(),
            Command::subscribe_project("snake"),
            Command::unsubscribe_project("snake"),
        ];

        for command in commands {
            let text = serde_json::to_string(&command).unwrap();
            let parsed: Command = serde_json::from_str(&text).unwrap();
            assert_eq!(parsed, command, "round trip changed {}", command.name());
        }
    }
}

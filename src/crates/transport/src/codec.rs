//! Envelope codec
//!
//! Inbound frames are JSON objects with an `event` tag. The backend sends
//! most events flat (`{"event": "...", "agent_id": ...}`) rather than nested
//! under `data`; a frame without a usable `data` member is delivered whole.

use crate::errors::{LinkError, LinkResult};
use office_core_types::{Command, Envelope};
use serde_json::Value;

/// Anything `ConnectionManager::send` accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Command(Command),
    Json(Value),
    /// Pre-serialized text, sent unchanged.
    Text(String),
}

impl Outbound {
    pub fn describe(&self) -> &str {
        match self {
            Outbound::Command(command) => command.name(),
            Outbound::Json(_) => "json",
            Outbound::Text(_) => "text",
        }
    }
}

impl From<Command> for Outbound {
    fn from(command: Command) -> Self {
        Outbound::Command(command)
    }
}

impl From<Value> for Outbound {
    fn from(value: Value) -> Self {
        Outbound::Json(value)
    }
}

impl From<String> for Outbound {
    fn from(text: String) -> Self {
        Outbound::Text(text)
    }
}

impl From<&str> for Outbound {
    fn from(text: &str) -> Self {
        Outbound::Text(text.to_string())
    }
}

pub fn encode(message: &Outbound) -> LinkResult<String> {
    match message {
        Outbound::Command(command) => serde_json::to_string(command)
            .map_err(|e| LinkError::Encode(format!("{}: {}", command.name(), e))),
        Outbound::Json(value) => {
            serde_json::to_string(value).map_err(|e| LinkError::Encode(e.to_string()))
        }
        Outbound::Text(text) => Ok(text.clone()),
    }
}

pub fn decode_text(text: &str) -> LinkResult<Envelope> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| LinkError::Decode(format!("Invalid JSON: {}", e)))?;
    envelope_from_value(value)
}

pub fn decode_binary(bytes: &[u8]) -> LinkResult<Envelope> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| LinkError::Decode(format!("Binary frame is not UTF-8: {}", e)))?;
    decode_text(text)
}

pub fn envelope_from_value(value: Value) -> LinkResult<Envelope> {
    let mut frame = match value {
        Value::Object(frame) => frame,
        other => {
            return Err(LinkError::Decode(format!(
                "Frame is not an object: {}",
                json_type_name(&other)
            )))
        }
    };

    let event = match frame.get("event") {
        Some(Value::String(tag)) if !tag.is_empty() => tag.clone(),
        Some(other) => {
            return Err(LinkError::Decode(format!(
                "Event tag must be a non-empty string, got {}",
                json_type_name(other)
            )))
        }
        None => return Err(LinkError::Decode("Frame has no event tag".to_string())),
    };

    let data = match frame.get("data") {
        Some(data) if !is_blank(data) => frame.remove("data").unwrap_or(Value::Null),
        _ => Value::Object(frame),
    };

    Ok(Envelope::new(event, data))
}

/// Shortened frame text for log lines.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `null`, `false`, zero and `""` carry no payload; such frames are flat.
fn is_blank(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64().map_or(false, |n| n == 0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_data_is_unwrapped() {
        let envelope = decode_text(
            r#"{"event":"agent_status","data":{"agent_id":"pm","status":"working"}}"#,
        )
        .unwrap();

        assert_eq!(envelope.event, "agent_status");
        assert_eq!(envelope.data, json!({"agent_id": "pm", "status": "working"}));
    }

    #[test]
    fn flat_frame_is_delivered_whole() {
        let raw = json!({
            "event": "phase_change",
            "project_id": "snake",
            "new_phase": "testing",
            "progress": 75.0
        });
        let envelope = decode_text(&raw.to_string()).unwrap();

        assert_eq!(envelope.event, "phase_change");
        assert_eq!(envelope.data, raw);
    }

    #[test]
    fn null_data_falls_back_to_frame() {
        let envelope = decode_text(r#"{"event":"pong","data":null,"timestamp":"t"}"#).unwrap();
        assert_eq!(envelope.data["timestamp"], "t");
    }

    #[test]
    fn blank_data_falls_back_to_frame() {
        for blank in [r#"false"#, r#"0"#, r#""""#] {
            let raw = format!(r#"{{"event":"file_update","data":{},"file_path":"a.md"}}"#, blank);
            let envelope = decode_text(&raw).unwrap();
            assert_eq!(envelope.data["file_path"], "a.md", "data = {}", blank);
        }

        let kept = decode_text(r#"{"event":"pong","data":[],"file_path":"a.md"}"#).unwrap();
        assert_eq!(kept.data, serde_json::json!([]));
        let kept = decode_text(r#"{"event":"pong","data":1}"#).unwrap();
        assert_eq!(kept.data, 1);
    }

    #[test]
    fn malformed_frames_are_decode_errors() {
        for raw in [
            "not json",
            "{\"event\":",
            "[1,2,3]",
            "\"agent_status\"",
            "{\"data\":{}}",
            "{\"event\":42}",
            "{\"event\":\"\"}",
        ] {
            assert!(
                matches!(decode_text(raw), Err(LinkError::Decode(_))),
                "{} should not decode",
                raw
            );
        }
    }

    #[test]
    fn binary_frames_must_be_utf8() {
        assert!(decode_binary(br#"{"event":"pong"}"#).is_ok());
        assert!(matches!(
            decode_binary(&[0xff, 0xfe, 0x00]),
            Err(LinkError::Decode(_))
        ));
    }

    #[test]
    fn text_passes_through_and_commands_serialize() {
        let raw = r#"{"type":"ping"}"#;
        assert_eq!(encode(&Outbound::from(raw)).unwrap(), raw);

        let text = encode(&Command::decision_response("d1", "继续").into()).unwrap();
        assert_eq!(
            text,
            r#"{"type":"boss_decision_response","decision_id":"d1","choice":"继续"}"#
        );

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["choice"], "继续");
    }

    #[test]
    fn json_value_round_trips_through_text() {
        let value = json!({"action": "subscribe_project", "project_id": "p-7"});
        let text = encode(&Outbound::from(value.clone())).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("短消息", 10), "短消息");
        assert_eq!(preview("继续开发下一个阶段", 2), "继续...");
    }
}

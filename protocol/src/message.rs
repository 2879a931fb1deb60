use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::ids::MessageId;

/// Priority band used by the Message Queue (spec §4.1). Ordered so that
/// `Critical > High > Normal > Low` holds via the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MessageType {
    UserInput,
    SlashCommand,
    ToolResult,
    TodoPlan,
    TodoExecute,
    TodoUpdate,
    TodoComplete,
    TodoSummary,
    AgentResponse,
}

/// Immutable once enqueued (spec §3, Message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub priority: Priority,
    pub payload: JsonValue,
    /// Legacy/alternate field some producers populate instead of `payload`.
    /// Token accounting prefers `payload`, falling back to this when it is
    /// absent (spec §9 open question (ii)).
    #[serde(default)]
    pub content: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl Message {
    pub fn new(kind: MessageType, priority: Priority, payload: JsonValue, source: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            kind,
            priority,
            payload,
            content: None,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }

    /// The value token estimation should read: `payload` unless it is
    /// `Value::Null`, in which case fall back to `content`.
    pub fn token_payload(&self) -> &JsonValue {
        if self.payload.is_null() {
            self.content.as_ref().unwrap_or(&self.payload)
        } else {
            &self.payload
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn priority_ordering_matches_spec() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn token_payload_prefers_payload() {
        let mut msg = Message::new(
            MessageType::UserInput,
            Priority::Normal,
            serde_json::json!({"text": "hi"}),
            "cli",
        );
        assert_eq!(msg.token_payload()["text"], "hi");

        msg.payload = JsonValue::Null;
        msg.content = Some(serde_json::json!({"text": "fallback"}));
        assert_eq!(msg.token_payload()["text"], "fallback");
    }
}

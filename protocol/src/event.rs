use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentResponseKind {
    Progress,
    Plan,
    Prompt,
    Result,
    Error,
    Status,
    Summary,
}

/// Event yielded by Agent Loop handlers (spec §4.2 item 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub kind: AgentResponseKind,
    pub content: String,
    #[serde(default)]
    pub metadata: JsonValue,
}

impl AgentResponse {
    pub fn progress(content: impl Into<String>) -> Self {
        Self {
            kind: AgentResponseKind::Progress,
            content: content.into(),
            metadata: JsonValue::Null,
        }
    }

    pub fn error(content: impl Into<String>, metadata: JsonValue) -> Self {
        Self {
            kind: AgentResponseKind::Error,
            content: content.into(),
            metadata,
        }
    }

    pub fn result(content: impl Into<String>) -> Self {
        Self {
            kind: AgentResponseKind::Result,
            content: content.into(),
            metadata: JsonValue::Null,
        }
    }

    pub fn plan(content: impl Into<String>, metadata: JsonValue) -> Self {
        Self {
            kind: AgentResponseKind::Plan,
            content: content.into(),
            metadata,
        }
    }

    pub fn prompt(content: impl Into<String>, metadata: JsonValue) -> Self {
        Self {
            kind: AgentResponseKind::Prompt,
            content: content.into(),
            metadata,
        }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self {
            kind: AgentResponseKind::Status,
            content: content.into(),
            metadata: JsonValue::Null,
        }
    }

    pub fn summary(content: impl Into<String>, metadata: JsonValue) -> Self {
        Self {
            kind: AgentResponseKind::Summary,
            content: content.into(),
            metadata,
        }
    }
}

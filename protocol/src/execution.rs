use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::ErrorKind;
use crate::ids::ExecutionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: ExecutionId,
    pub tool_name: String,
    pub state: ExecutionState,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>,
    pub result: Option<JsonValue>,
    pub error: Option<ErrorKind>,
    pub logs: Vec<String>,
    pub metrics: ExecutionMetrics,
}

impl ExecutionRecord {
    pub fn pending(tool_name: impl Into<String>) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            tool_name: tool_name.into(),
            state: ExecutionState::Pending,
            start_ts: Utc::now(),
            end_ts: None,
            result: None,
            error: None,
            logs: Vec::new(),
            metrics: ExecutionMetrics::default(),
        }
    }

    pub fn fail(mut self, error: ErrorKind) -> Self {
        self.state = ExecutionState::Failed;
        self.error = Some(error);
        self.end_ts = Some(Utc::now());
        self.metrics.duration_ms = (self.end_ts.unwrap() - self.start_ts)
            .num_milliseconds()
            .max(0) as u64;
        self
    }

    pub fn complete(mut self, result: JsonValue) -> Self {
        self.state = ExecutionState::Completed;
        self.result = Some(result);
        self.end_ts = Some(Utc::now());
        self.metrics.duration_ms = (self.end_ts.unwrap() - self.start_ts)
            .num_milliseconds()
            .max(0) as u64;
        self
    }

    pub fn cancel(mut self) -> Self {
        self.state = ExecutionState::Cancelled;
        self.error = Some(ErrorKind::Cancelled);
        self.end_ts = Some(Utc::now());
        self
    }
}

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::ids::TodoId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoPriority {
    Low,
    Medium,
    High,
}

impl TodoPriority {
    /// Numeric weight used for sort order in `startTodoQueueExecution`
    /// (spec §4.7 item 1): High=3, Medium=2, Low=1.
    pub fn weight(self) -> u8 {
        match self {
            TodoPriority::High => 3,
            TodoPriority::Medium => 2,
            TodoPriority::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub content: String,
    pub active_form: String,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(content: impl Into<String>, active_form: impl Into<String>, priority: TodoPriority) -> Self {
        let now = Utc::now();
        Self {
            id: TodoId::new(),
            content: content.into(),
            active_form: active_form.into(),
            status: TodoStatus::Pending,
            priority,
            created_at: now,
            updated_at: now,
        }
    }
}

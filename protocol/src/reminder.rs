use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::message::Priority;

/// Kept distinct from `MessageType` since reminders are meta-messages the
/// loop injects for the model, never shown to the end user (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderCategory {
    Todo,
    FileContext,
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemReminder {
    pub category: ReminderCategory,
    pub priority: Priority,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl SystemReminder {
    pub fn new(category: ReminderCategory, priority: Priority, content: impl Into<String>) -> Self {
        Self {
            category,
            priority,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// State transitions the engine observes (spec §4.8: `session:startup`,
/// `todo:changed`, `file:read`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderTrigger {
    SessionStartup,
    TodoChanged { state_hash: u64 },
    FileRead { path: String },
}

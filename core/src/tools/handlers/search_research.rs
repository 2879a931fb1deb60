use async_trait::async_trait;
use serde_json::Value as JsonValue;
use serde_json::json;
use writeflow_protocol::PermissionLevel;
use writeflow_protocol::RuntimeError;

use crate::tools::Tool;
use crate::tools::ToolContext;
use crate::tools::ToolEvent;
use crate::tools::ToolEventSender;
use crate::tools::invalid_input;

/// Naive substring search over a caller-supplied corpus of research
/// items. The corpus is passed in `input.items` rather than read from
/// session state directly, keeping the tool a pure function of its input
/// per spec §6 ("tools consume JSON-validated input objects").
pub struct SearchResearchTool;

#[async_trait]
impl Tool for SearchResearchTool {
    fn name(&self) -> &str {
        "search_research"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn concurrency_safe(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::ReadOnly
    }

    fn validate(&self, input: &JsonValue) -> Result<(), RuntimeError> {
        input
            .get("query")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid_input("search_research requires a non-empty string 'query'"))?;
        if !input.get("items").map(|v| v.is_array()).unwrap_or(true) {
            return Err(invalid_input("search_research 'items' must be an array when present"));
        }
        Ok(())
    }

    async fn call(&self, input: JsonValue, _ctx: &ToolContext, events: ToolEventSender) {
        let query = input["query"].as_str().unwrap_or_default().to_lowercase();
        let items = input.get("items").and_then(JsonValue::as_array).cloned().unwrap_or_default();

        let _ = events.send(ToolEvent::Progress {
            progress: Some(50),
            step: format!("scanning {} items", items.len()),
        });

        let matches: Vec<JsonValue> = items
            .into_iter()
            .filter(|item| {
                item.get("title")
                    .and_then(JsonValue::as_str)
                    .map(|t| t.to_lowercase().contains(&query))
                    .unwrap_or(false)
                    || item
                        .get("body")
                        .and_then(JsonValue::as_str)
                        .map(|b| b.to_lowercase().contains(&query))
                        .unwrap_or(false)
            })
            .collect();

        let _ = events.send(ToolEvent::Result(json!({ "matches": matches })));
    }
}

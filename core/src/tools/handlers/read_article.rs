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

/// Reads a file within the working directory, reusing the same path
/// containment rules as the File Reference Resolver (spec §4.9).
pub struct ReadArticleTool;

#[async_trait]
impl Tool for ReadArticleTool {
    fn name(&self) -> &str {
        "read_article"
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
            .get("path")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid_input("read_article requires a non-empty string 'path'"))?;
        Ok(())
    }

    async fn call(&self, input: JsonValue, ctx: &ToolContext, events: ToolEventSender) {
        let path = input["path"].as_str().unwrap_or_default();
        let _ = events.send(ToolEvent::Progress {
            progress: Some(10),
            step: format!("resolving {path}"),
        });

        match writeflow_file_ignore::resolve_mention(&ctx.working_dir, path) {
            Ok(resolved) => {
                let _ = events.send(ToolEvent::Result(json!({
                    "path": resolved.path.display().to_string(),
                    "content": resolved.content,
                })));
            }
            Err(reason) => {
                let _ = events.send(ToolEvent::Error(invalid_input(reason.to_string())));
            }
        }
    }
}

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

/// Writes a new draft file under the working directory. `SafeWrite`
/// level; eligible for working-directory trust (spec §4.3 step 6).
pub struct WriteDraftTool;

#[async_trait]
impl Tool for WriteDraftTool {
    fn name(&self) -> &str {
        "write_draft"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn concurrency_safe(&self) -> bool {
        false
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::SafeWrite
    }

    fn validate(&self, input: &JsonValue) -> Result<(), RuntimeError> {
        input
            .get("path")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid_input("write_draft requires a non-empty string 'path'"))?;
        input
            .get("content")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| invalid_input("write_draft requires a string 'content'"))?;
        Ok(())
    }

    async fn call(&self, input: JsonValue, ctx: &ToolContext, events: ToolEventSender) {
        let path = input["path"].as_str().unwrap_or_default();
        let content = input["content"].as_str().unwrap_or_default();
        let target = ctx.working_dir.join(path);

        let _ = events.send(ToolEvent::Progress {
            progress: Some(30),
            step: "writing draft".to_string(),
        });

        match tokio::fs::write(&target, content).await {
            Ok(()) => {
                let _ = events.send(ToolEvent::Result(json!({
                    "path": target.display().to_string(),
                    "bytes_written": content.len(),
                })));
            }
            Err(err) => {
                let _ = events.send(ToolEvent::Error(invalid_input(format!("failed to write draft: {err}"))));
            }
        }
    }
}

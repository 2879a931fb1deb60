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

/// Replaces the first occurrence of `find` with `replace` in an existing
/// article file. `SafeWrite` level.
pub struct EditArticleTool;

#[async_trait]
impl Tool for EditArticleTool {
    fn name(&self) -> &str {
        "edit_article"
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
        for field in ["path", "find", "replace"] {
            input
                .get(field)
                .and_then(JsonValue::as_str)
                .ok_or_else(|| invalid_input(format!("edit_article requires a string '{field}'")))?;
        }
        Ok(())
    }

    async fn call(&self, input: JsonValue, ctx: &ToolContext, events: ToolEventSender) {
        let path = input["path"].as_str().unwrap_or_default();
        let find = input["find"].as_str().unwrap_or_default();
        let replace = input["replace"].as_str().unwrap_or_default();
        let target = ctx.working_dir.join(path);

        let _ = events.send(ToolEvent::Progress {
            progress: Some(20),
            step: "reading article".to_string(),
        });

        let original = match tokio::fs::read_to_string(&target).await {
            Ok(content) => content,
            Err(err) => {
                let _ = events.send(ToolEvent::Error(invalid_input(format!("cannot read {path}: {err}"))));
                return;
            }
        };

        if !original.contains(find) {
            let _ = events.send(ToolEvent::Error(invalid_input("'find' text not present in article")));
            return;
        }

        let updated = original.replacen(find, replace, 1);
        match tokio::fs::write(&target, &updated).await {
            Ok(()) => {
                let _ = events.send(ToolEvent::Result(json!({ "path": path, "replaced": true })));
            }
            Err(err) => {
                let _ = events.send(ToolEvent::Error(invalid_input(format!("failed to write {path}: {err}"))));
            }
        }
    }
}

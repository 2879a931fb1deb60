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

/// Marks an article as published by renaming it into a `published/`
/// subdirectory of the working directory. `SystemModify` level: denied
/// outside `AcceptEdits`/`BypassPermissions` (spec §4.3 scenario 3).
pub struct PublishArticleTool;

#[async_trait]
impl Tool for PublishArticleTool {
    fn name(&self) -> &str {
        "publish_article"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn concurrency_safe(&self) -> bool {
        false
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::SystemModify
    }

    fn validate(&self, input: &JsonValue) -> Result<(), RuntimeError> {
        input
            .get("path")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid_input("publish_article requires a non-empty string 'path'"))?;
        Ok(())
    }

    async fn call(&self, input: JsonValue, ctx: &ToolContext, events: ToolEventSender) {
        let path = input["path"].as_str().unwrap_or_default();
        let source = ctx.working_dir.join(path);
        let published_dir = ctx.working_dir.join("published");

        let _ = events.send(ToolEvent::Progress {
            progress: Some(40),
            step: "preparing publish directory".to_string(),
        });

        if let Err(err) = tokio::fs::create_dir_all(&published_dir).await {
            let _ = events.send(ToolEvent::Error(invalid_input(format!(
                "failed to create published directory: {err}"
            ))));
            return;
        }

        let file_name = source.file_name().map(|n| n.to_owned());
        let Some(file_name) = file_name else {
            let _ = events.send(ToolEvent::Error(invalid_input("path has no file name")));
            return;
        };
        let destination = published_dir.join(file_name);

        match tokio::fs::rename(&source, &destination).await {
            Ok(()) => {
                let _ = events.send(ToolEvent::Result(json!({
                    "published_path": destination.display().to_string(),
                })));
            }
            Err(err) => {
                let _ = events.send(ToolEvent::Error(invalid_input(format!("failed to publish: {err}"))));
            }
        }
    }
}

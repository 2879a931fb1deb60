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

/// Runs an arbitrary shell command. `Dangerous` level: only reachable in
/// `BypassPermissions` mode or via an explicit grant (spec §4.3).
pub struct RunShellTool;

#[async_trait]
impl Tool for RunShellTool {
    fn name(&self) -> &str {
        "run_shell"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn concurrency_safe(&self) -> bool {
        false
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Dangerous
    }

    fn validate(&self, input: &JsonValue) -> Result<(), RuntimeError> {
        input
            .get("command")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid_input("run_shell requires a non-empty string 'command'"))?;
        Ok(())
    }

    async fn call(&self, input: JsonValue, ctx: &ToolContext, events: ToolEventSender) {
        let command = input["command"].as_str().unwrap_or_default();
        let _ = events.send(ToolEvent::Progress {
            progress: Some(10),
            step: format!("running: {command}"),
        });

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&ctx.working_dir)
            .output()
            .await;

        match output {
            Ok(out) => {
                let _ = events.send(ToolEvent::Result(json!({
                    "exit_code": out.status.code(),
                    "stdout": String::from_utf8_lossy(&out.stdout),
                    "stderr": String::from_utf8_lossy(&out.stderr),
                })));
            }
            Err(err) => {
                let _ = events.send(ToolEvent::Error(invalid_input(format!("failed to spawn shell: {err}"))));
            }
        }
    }
}

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use serde_json::json;
use writeflow_protocol::PermissionLevel;
use writeflow_protocol::RuntimeError;

use crate::tools::Tool;
use crate::tools::ToolContext;
use crate::tools::ToolEvent;
use crate::tools::ToolEventSender;

/// Synthetic tool offered alongside every Plan-mode prompt (spec §4.2,
/// "augmented with `exit_plan_mode`"). Calling it is a pure signal — the
/// Agent Loop is responsible for transitioning the session's mode in
/// response, not this tool itself.
pub struct ExitPlanModeTool;

#[async_trait]
impl Tool for ExitPlanModeTool {
    fn name(&self) -> &str {
        "exit_plan_mode"
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

    fn validate(&self, _input: &JsonValue) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn call(&self, _input: JsonValue, _ctx: &ToolContext, events: ToolEventSender) {
        let _ = events.send(ToolEvent::Result(json!({ "exit_requested": true })));
    }
}

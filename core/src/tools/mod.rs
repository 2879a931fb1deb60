//! Tool interface and built-in handlers (spec §3 Tool, §4.4).

pub mod handlers;
pub mod orchestrator;

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::UnboundedSender;
use writeflow_protocol::ErrorKind;
use writeflow_protocol::PermissionLevel;
use writeflow_protocol::RuntimeError;

/// A single event yielded by a running tool call.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Progress { progress: Option<u8>, step: String },
    Result(JsonValue),
    Error(RuntimeError),
}

/// Runtime arguments passed to `Tool::call`.
pub struct ToolContext {
    pub working_dir: PathBuf,
    pub execution_id: writeflow_protocol::ExecutionId,
}

pub type ToolEventSender = UnboundedSender<ToolEvent>;

/// Minimal tool interface: `{validate, call, metadata}` as described in
/// spec §9's design notes ("the tool interface is the minimum set").
/// `call` streams progress/result/error events over `events` rather than
/// returning them eagerly, so the orchestrator can forward progress to
/// its own channel while the tool is still running.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn read_only(&self) -> bool;
    fn concurrency_safe(&self) -> bool;
    fn permission_level(&self) -> PermissionLevel;

    /// Validate `input` against the tool's schema/business rules.
    fn validate(&self, input: &JsonValue) -> Result<(), RuntimeError>;

    /// Execute the tool. Every call must emit at least one `Result` event
    /// unless it errors (spec §4.4, "Tool call semantics").
    async fn call(&self, input: JsonValue, ctx: &ToolContext, events: ToolEventSender);
}

pub fn invalid_input(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(ErrorKind::InvalidInput, message)
}

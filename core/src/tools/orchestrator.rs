//! Tool registry, single and batch execution (spec §4.4).

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use writeflow_protocol::ErrorKind;
use writeflow_protocol::ExecutionRecord;
use writeflow_protocol::Priority;
use writeflow_protocol::RuntimeError;

use crate::permissions::CheckContext;
use crate::permissions::PermissionManager;
use crate::tools::Tool;
use crate::tools::ToolContext;
use crate::tools::ToolEvent;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 5;

/// Registers tools by name; duplicate registrations are rejected (spec
/// §4.4, "Registration").
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RuntimeError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RuntimeError::new(
                ErrorKind::Bug,
                format!("tool '{name}' is already registered"),
            ));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub tool_name: String,
    pub input: JsonValue,
    pub priority: Priority,
    pub dependencies: Vec<String>,
    pub timeout: Option<Duration>,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>, input: JsonValue) -> Self {
        Self {
            tool_name: tool_name.into(),
            input,
            priority: Priority::Normal,
            dependencies: Vec::new(),
            timeout: None,
        }
    }
}

/// Drives tool execution: single calls, batch scheduling, per-tool-name
/// serialization for non-concurrency-safe tools.
pub struct ToolOrchestrator {
    registry: Arc<ToolRegistry>,
    permissions: Arc<PermissionManager>,
    working_dir: PathBuf,
    max_concurrent_executions: usize,
    /// Tool names currently executing without concurrency safety; used to
    /// serialize same-name calls (spec §4.4, "Concurrency safety").
    running_unsafe: Arc<Mutex<HashSet<String>>>,
}

impl ToolOrchestrator {
    pub fn new(registry: Arc<ToolRegistry>, permissions: Arc<PermissionManager>, working_dir: PathBuf) -> Self {
        Self {
            registry,
            permissions,
            working_dir,
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
            running_unsafe: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_max_concurrent_executions(mut self, n: usize) -> Self {
        self.max_concurrent_executions = n;
        self
    }

    pub fn registered_tool_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Serializes non-concurrency-safe same-name executions by waiting
    /// until no other instance of `tool_name` is running.
    async fn acquire_name_lock(&self, tool: &Arc<dyn Tool>) {
        if tool.concurrency_safe() {
            return;
        }
        loop {
            {
                let mut running = self.running_unsafe.lock().await;
                if !running.contains(tool.name()) {
                    running.insert(tool.name().to_string());
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn release_name_lock(&self, tool: &Arc<dyn Tool>) {
        if tool.concurrency_safe() {
            return;
        }
        self.running_unsafe.lock().await.remove(tool.name());
    }

    /// `executeTool` (spec §4.4).
    pub async fn execute_tool(&self, req: ToolRequest) -> ExecutionRecord {
        let record = ExecutionRecord::pending(req.tool_name.clone());

        let Some(tool) = self.registry.get(&req.tool_name) else {
            return record.fail(ErrorKind::ToolNotFound);
        };

        let check_ctx = CheckContext {
            input_path: req.input.get("path").and_then(JsonValue::as_str).map(std::path::Path::new),
            auto_approve: false,
        };
        match self.permissions.check(&req.tool_name, &check_ctx) {
            Ok(writeflow_protocol::PermissionDecision::Allowed) => {}
            Ok(writeflow_protocol::PermissionDecision::Ask) | Err(_) => {
                return record.fail(ErrorKind::PermissionDenied);
            }
        }

        if let Err(_err) = tool.validate(&req.input) {
            return record.fail(ErrorKind::InvalidInput);
        }

        self.acquire_name_lock(&tool).await;
        let result = self.run_with_timeout(&tool, req, record.clone()).await;
        self.release_name_lock(&tool).await;
        result
    }

    async fn run_with_timeout(&self, tool: &Arc<dyn Tool>, req: ToolRequest, record: ExecutionRecord) -> ExecutionRecord {
        let effective_timeout = req.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let cancel = CancellationToken::new();
        let ctx = ToolContext {
            working_dir: self.working_dir.clone(),
            execution_id: record.execution_id,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let tool_for_call = Arc::clone(tool);
        let input = req.input;
        let child_cancel = cancel.clone();
        let call_task = tokio::spawn(async move {
            tokio::select! {
                _ = child_cancel.cancelled() => {}
                _ = tool_for_call.call(input, &ctx, tx) => {}
            }
        });

        let start = Instant::now();
        let mut final_result = None;
        let mut final_error = None;

        let drain = async {
            while let Some(event) = rx.recv().await {
                match event {
                    ToolEvent::Progress { .. } => {
                        // Forwarded to a progress channel by the caller in
                        // a full UI integration; the orchestrator itself
                        // only needs to keep draining.
                    }
                    ToolEvent::Result(value) => final_result = Some(value),
                    ToolEvent::Error(err) => {
                        final_error = Some(err);
                        break;
                    }
                }
            }
        };

        if timeout(effective_timeout, drain).await.is_err() {
            cancel.cancel();
            call_task.abort();
            warn!(tool = tool.name(), elapsed_ms = start.elapsed().as_millis() as u64, "tool execution timed out");
            return record.fail(ErrorKind::Timeout);
        }
        let _ = call_task.await;

        if let Some(err) = final_error {
            record.fail(err.kind)
        } else if let Some(value) = final_result {
            record.complete(value)
        } else {
            record.fail(ErrorKind::Bug)
        }
    }

    /// `executeToolsBatch` (spec §4.4).
    pub async fn execute_batch(&self, reqs: Vec<ToolRequest>) -> Vec<ExecutionRecord> {
        let (independents, dependents): (Vec<_>, Vec<_>) =
            reqs.into_iter().partition(|r| r.dependencies.is_empty());

        let mut independents = independents;
        independents.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut records: Vec<ExecutionRecord> = Vec::new();
        let mut completed_by_name: HashMap<String, bool> = HashMap::new();

        for wave in independents.chunks(self.max_concurrent_executions) {
            let futures = wave.iter().cloned().map(|req| {
                let orchestrator = self;
                async move { orchestrator.execute_tool(req).await }
            });
            let wave_results = futures::future::join_all(futures).await;
            for r in wave_results {
                completed_by_name.insert(r.tool_name.clone(), r.state == writeflow_protocol::ExecutionState::Completed);
                records.push(r);
            }
        }

        let mut dependents = dependents;
        dependents.sort_by(|a, b| b.priority.cmp(&a.priority));
        for req in dependents {
            let deps_met = req
                .dependencies
                .iter()
                .all(|dep| completed_by_name.get(dep).copied().unwrap_or(false));
            if !deps_met {
                let record = ExecutionRecord::pending(req.tool_name.clone()).fail(ErrorKind::UnmetDependency);
                completed_by_name.insert(req.tool_name.clone(), false);
                records.push(record);
                continue;
            }
            let r = self.execute_tool(req).await;
            completed_by_name.insert(r.tool_name.clone(), r.state == writeflow_protocol::ExecutionState::Completed);
            records.push(r);
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use writeflow_protocol::ExecutionState;
    use writeflow_protocol::PermissionLevel;
    use writeflow_protocol::PermissionPolicy;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
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
        async fn call(&self, input: JsonValue, _ctx: &ToolContext, events: crate::tools::ToolEventSender) {
            let _ = events.send(ToolEvent::Result(input));
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
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
        async fn call(&self, _input: JsonValue, _ctx: &ToolContext, events: crate::tools::ToolEventSender) {
            let _ = events.send(ToolEvent::Error(RuntimeError::new(ErrorKind::Bug, "boom")));
        }
    }

    fn orchestrator() -> ToolOrchestrator {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(FailingTool)).unwrap();
        let permissions = Arc::new(PermissionManager::new(
            vec![
                PermissionPolicy::always_allow("echo", PermissionLevel::ReadOnly),
                PermissionPolicy::always_allow("fail", PermissionLevel::ReadOnly),
            ],
            std::env::temp_dir(),
        ));
        ToolOrchestrator::new(registry, permissions, std::env::temp_dir())
    }

    #[tokio::test]
    async fn tool_not_found() {
        let o = orchestrator();
        let record = o.execute_tool(ToolRequest::new("missing", json!({}))).await;
        assert_eq!(record.state, ExecutionState::Failed);
        assert_eq!(record.error, Some(ErrorKind::ToolNotFound));
    }

    #[tokio::test]
    async fn successful_execution_populates_result() {
        let o = orchestrator();
        let record = o.execute_tool(ToolRequest::new("echo", json!({"x": 1}))).await;
        assert_eq!(record.state, ExecutionState::Completed);
        assert_eq!(record.result, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn dependency_failure_blocks_dependent() {
        let o = orchestrator();
        let reqs = vec![
            ToolRequest::new("fail", json!({})),
            ToolRequest {
                dependencies: vec!["fail".to_string()],
                ..ToolRequest::new("echo", json!({}))
            },
        ];
        let records = o.execute_batch(reqs).await;
        let dependent = records.iter().find(|r| r.tool_name == "echo").unwrap();
        assert_eq!(dependent.error, Some(ErrorKind::UnmetDependency));
    }
}

//! `Session`: the shared context object threading the runtime's components
//! together (spec §9, "breaking cyclic references via a session context
//! passed by reference"). The Agent Loop's model-facing handler holds only
//! a `Weak<Session>`, so `Session → AgentLoop → ModelHandler → Session`
//! never keeps the session alive past its owner.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use writeflow_protocol::AgentResponse;
use writeflow_protocol::ArticleContext;
use writeflow_protocol::Config;
use writeflow_protocol::Message;
use writeflow_protocol::PermissionLevel;
use writeflow_protocol::PermissionPolicy;

use crate::adapters::multiplexer::MultiplexedEvent;
use crate::adapters::multiplexer::StreamMultiplexer;
use crate::adapters::registry::AdapterRegistry;
use crate::agent_loop::AgentLoop;
use crate::agent_loop::HandlerKind;
use crate::agent_loop::ModelHandler;
use crate::permissions::PermissionManager;
use crate::queue::MessageQueue;
use crate::system_reminder::ReminderEngine;
use crate::system_reminder::generators::FileContextGenerator;
use crate::system_reminder::generators::SessionStartupGenerator;
use crate::system_reminder::generators::TodoStatusGenerator;
use crate::todo_engine::TodoEngine;
use crate::tools::ToolContext;
use crate::tools::handlers::EditArticleTool;
use crate::tools::handlers::ExitPlanModeTool;
use crate::tools::handlers::FetchUrlTool;
use crate::tools::handlers::PublishArticleTool;
use crate::tools::handlers::ReadArticleTool;
use crate::tools::handlers::RunShellTool;
use crate::tools::handlers::SearchResearchTool;
use crate::tools::handlers::WriteDraftTool;
use crate::tools::orchestrator::ToolOrchestrator;
use crate::tools::orchestrator::ToolRegistry;
use crate::tools::orchestrator::ToolRequest;

/// Default grants for the built-in tool set. Read-only tools are always
/// allowed; writes and network calls require a session or one-time grant;
/// `run_shell` requires a fresh grant every time (spec §4.3, `Dangerous`).
fn default_policies() -> Vec<PermissionPolicy> {
    use writeflow_protocol::GrantType;
    vec![
        PermissionPolicy::always_allow("exit_plan_mode", PermissionLevel::ReadOnly),
        PermissionPolicy::always_allow("read_article", PermissionLevel::ReadOnly),
        PermissionPolicy::always_allow("search_research", PermissionLevel::ReadOnly),
        PermissionPolicy {
            tool_name: "write_draft".to_string(),
            level: PermissionLevel::SafeWrite,
            grant_type: GrantType::SessionGrant,
            max_per_session: None,
            require_confirmation: false,
        },
        PermissionPolicy {
            tool_name: "edit_article".to_string(),
            level: PermissionLevel::SafeWrite,
            grant_type: GrantType::SessionGrant,
            max_per_session: None,
            require_confirmation: false,
        },
        PermissionPolicy {
            tool_name: "fetch_url".to_string(),
            level: PermissionLevel::NetworkAccess,
            grant_type: GrantType::OneTimeGrant,
            max_per_session: None,
            require_confirmation: true,
        },
        PermissionPolicy {
            tool_name: "publish_article".to_string(),
            level: PermissionLevel::SystemModify,
            grant_type: GrantType::OneTimeGrant,
            max_per_session: None,
            require_confirmation: true,
        },
        PermissionPolicy {
            tool_name: "run_shell".to_string(),
            level: PermissionLevel::Dangerous,
            grant_type: GrantType::OneTimeGrant,
            max_per_session: None,
            require_confirmation: true,
        },
    ]
}

fn register_builtin_tools(registry: &ToolRegistry) {
    let _ = registry.register(Arc::new(ExitPlanModeTool));
    let _ = registry.register(Arc::new(ReadArticleTool));
    let _ = registry.register(Arc::new(SearchResearchTool));
    let _ = registry.register(Arc::new(WriteDraftTool));
    let _ = registry.register(Arc::new(EditArticleTool));
    let _ = registry.register(Arc::new(FetchUrlTool::default()));
    let _ = registry.register(Arc::new(PublishArticleTool));
    let _ = registry.register(Arc::new(RunShellTool));
}

pub struct Session {
    pub config: Config,
    pub working_dir: PathBuf,
    pub queue: Arc<MessageQueue>,
    pub permissions: Arc<PermissionManager>,
    pub orchestrator: Arc<ToolOrchestrator>,
    pub adapters: AdapterRegistry,
    pub multiplexer: StreamMultiplexer,
    pub context: Arc<Mutex<ArticleContext>>,
    pub reminders: Arc<ReminderEngine>,
    pub todo_status_generator: Arc<TodoStatusGenerator>,
    pub todo_engine: Arc<TodoEngine>,
    pub agent_loop: Arc<AgentLoop>,
}

impl Session {
    pub fn new(config: Config, working_dir: PathBuf) -> Arc<Self> {
        let queue = Arc::new(MessageQueue::new(crate::queue::DEFAULT_CAPACITY));
        let permissions = Arc::new(PermissionManager::new(default_policies(), working_dir.clone()));
        let registry = Arc::new(ToolRegistry::new());
        register_builtin_tools(&registry);
        let orchestrator = Arc::new(ToolOrchestrator::new(Arc::clone(&registry), Arc::clone(&permissions), working_dir.clone()));
        let todo_status_generator = Arc::new(TodoStatusGenerator::new());
        let reminders = Arc::new(ReminderEngine::new(vec![
            Arc::new(SessionStartupGenerator),
            Arc::clone(&todo_status_generator) as Arc<dyn crate::system_reminder::AttachmentGenerator>,
            Arc::new(FileContextGenerator),
        ]));
        let todo_engine = Arc::new(TodoEngine::new(Arc::clone(&queue)));
        let context = Arc::new(Mutex::new(ArticleContext::new()));

        Arc::new_cyclic(|weak_session: &Weak<Session>| {
            let handler: Arc<dyn ModelHandler> = Arc::new(SessionModelHandler(Weak::clone(weak_session)));
            let agent_loop = Arc::new(AgentLoop::new(
                Arc::clone(&queue),
                Arc::clone(&permissions),
                Arc::clone(&orchestrator),
                handler,
                Arc::clone(&context),
            ));
            Self {
                config,
                working_dir,
                queue,
                permissions,
                orchestrator,
                adapters: AdapterRegistry::with_default_providers(),
                multiplexer: StreamMultiplexer::default(),
                context,
                reminders,
                todo_status_generator,
                todo_engine,
                agent_loop,
            }
        })
    }

    /// Which model pointer a turn should resolve against (spec §6,
    /// `modelPointers: {main, task, reasoning, quick}`).
    fn pointer_for(kind: HandlerKind) -> &'static str {
        match kind {
            HandlerKind::ResearchRequest => "reasoning",
            HandlerKind::GeneralQuery => "quick",
            _ => "main",
        }
    }

    async fn run_turn(&self, kind: HandlerKind, message: &Message, _cancel: CancellationToken, out: &UnboundedSender<AgentResponse>) {
        let pointer = Self::pointer_for(kind);
        let Some(profile) = self.config.profile_for(Some(pointer)).or_else(|| self.config.profile_for(None)).cloned() else {
            let _ = out.send(AgentResponse::error(
                "no model profile configured for this request",
                json!({"pointer": pointer}),
            ));
            return;
        };

        let Some(adapter) = self.adapters.get(&profile.provider) else {
            let _ = out.send(AgentResponse::error(
                format!("no adapter registered for provider '{}'", profile.provider),
                JsonValue::Null,
            ));
            return;
        };

        let text = message
            .payload
            .get("text")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| message.payload.to_string());
        let messages = vec![json!({"role": "user", "content": text})];

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.multiplexer.stream(adapter, &profile, &messages, tx).await;

        let mut buffer = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                MultiplexedEvent::Chunk(chunk) => {
                    if let Some(error) = chunk.error {
                        let _ = out.send(AgentResponse::error(format!("{error:?}"), JsonValue::Null));
                        return;
                    }
                    if !chunk.content_delta.is_empty() {
                        buffer.push_str(&chunk.content_delta);
                        let _ = out.send(AgentResponse::progress(chunk.content_delta));
                    }
                    if chunk.done {
                        let _ = out.send(AgentResponse::result(buffer.clone()));
                    }
                }
                MultiplexedEvent::ToolUse(value) => {
                    self.dispatch_tool_use(value, out).await;
                }
            }
        }
    }

    async fn dispatch_tool_use(&self, value: JsonValue, out: &UnboundedSender<AgentResponse>) {
        let Some(tool_name) = value.get("tool_name").and_then(JsonValue::as_str) else {
            return;
        };
        let input = value.get("input").cloned().unwrap_or(JsonValue::Null);
        let record = self.orchestrator.execute_tool(ToolRequest::new(tool_name, input)).await;
        match record.error {
            Some(kind) => {
                let _ = out.send(AgentResponse::error(format!("{tool_name} failed: {kind:?}"), JsonValue::Null));
            }
            None => {
                let _ = out.send(AgentResponse::progress(format!(
                    "{tool_name} -> {}",
                    record.result.clone().unwrap_or(JsonValue::Null)
                )));
            }
        }
    }

    pub fn tool_context(&self, execution_id: writeflow_protocol::ExecutionId) -> ToolContext {
        ToolContext {
            working_dir: self.working_dir.clone(),
            execution_id,
        }
    }

    pub async fn run(self: &Arc<Self>) {
        let agent_loop = Arc::clone(&self.agent_loop);
        agent_loop.run().await;
    }

    pub async fn shutdown(&self) {
        self.agent_loop.close().await;
    }
}

/// Weak-held bridge so the loop's `ModelHandler` does not keep `Session`
/// alive (spec §9 cyclic-reference note).
struct SessionModelHandler(Weak<Session>);

#[async_trait]
impl ModelHandler for SessionModelHandler {
    async fn handle(&self, kind: HandlerKind, message: &Message, cancel: CancellationToken, out: &UnboundedSender<AgentResponse>) {
        let Some(session) = self.0.upgrade() else {
            warn!("session dropped before its model handler could run a turn");
            return;
        };
        session.run_turn(kind, message, cancel, out).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use writeflow_protocol::MessageType;
    use writeflow_protocol::Priority;

    #[tokio::test]
    async fn missing_model_profile_surfaces_as_error_event() {
        let session = Session::new(Config::default(), std::env::temp_dir());
        let runner = Arc::clone(&session);
        tokio::spawn(async move { runner.run().await });

        let message = Message::new(MessageType::UserInput, Priority::Normal, json!({"text": "hello"}), "cli");
        let mut rx = session.agent_loop.submit(message).await;
        let response = rx.recv().await.unwrap();
        assert_eq!(response.kind, writeflow_protocol::AgentResponseKind::Error);

        session.shutdown().await;
    }

    #[test]
    fn builtin_tools_are_all_registered() {
        let session = Session::new(Config::default(), std::env::temp_dir());
        let mut names = session.orchestrator.registered_tool_names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "edit_article",
                "exit_plan_mode",
                "fetch_url",
                "publish_article",
                "read_article",
                "run_shell",
                "search_research",
                "write_draft",
            ]
        );
    }
}

//! Agent Loop (spec §4.2): the long-lived task that dequeues messages,
//! resolves mode, routes to a handler, and tracks session statistics.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use writeflow_common::Ewma;
use writeflow_protocol::AgentResponse;
use writeflow_protocol::ArticleContext;
use writeflow_protocol::Message;
use writeflow_protocol::MessageId;
use writeflow_protocol::MessageType;
use writeflow_protocol::Mode;

use crate::compact::Compressor;
use crate::permissions::PermissionManager;
use crate::queue::DequeueOutcome;
use crate::queue::MessageQueue;
use crate::tools::orchestrator::ToolOrchestrator;

pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Processing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    SlashCommand,
    ArticleRequest,
    EditRequest,
    ResearchRequest,
    GeneralQuery,
    TodoSubtype,
}

#[derive(Debug, Clone)]
pub struct SessionStats {
    pub message_count: u64,
    pub avg_response_ms: f64,
    pub error_count: u64,
    pub last_activity: DateTime<Utc>,
}

/// The model-facing side of a handler: everything the loop itself does not
/// own (provider selection, streaming, tool invocation for a given turn).
/// Implemented by the session layer, which composes the Stream Multiplexer
/// and Tool Orchestrator; the loop only needs to know it can be asked to
/// run a turn and stream `AgentResponse` events back.
#[async_trait]
pub trait ModelHandler: Send + Sync {
    async fn handle(&self, kind: HandlerKind, message: &Message, cancel: CancellationToken, out: &UnboundedSender<AgentResponse>);
}

/// Routes `TodoPlan`/`TodoExecute`/`TodoComplete`/`TodoSummary` directly to
/// `AgentResponse` events without involving the model handler.
fn todo_response(message: &Message) -> AgentResponse {
    match message.kind {
        MessageType::TodoPlan => AgentResponse::plan(describe_payload(message), message.payload.clone()),
        MessageType::TodoExecute => AgentResponse::progress(describe_payload(message)),
        MessageType::TodoUpdate => AgentResponse::status(describe_payload(message)),
        MessageType::TodoComplete => AgentResponse::status(describe_payload(message)),
        MessageType::TodoSummary => AgentResponse::summary(describe_payload(message), message.payload.clone()),
        _ => AgentResponse::status(describe_payload(message)),
    }
}

fn describe_payload(message: &Message) -> String {
    message
        .payload
        .get("content")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| message.payload.to_string())
}

struct Stats {
    count: u64,
    ewma: Ewma,
    error_count: u64,
    last_activity: DateTime<Utc>,
}

/// `startTodoQueueExecution` and friends live in `TodoEngine`; the loop just
/// routes their output messages. Mode resolution, routing, the state
/// machine, and cancellation/grace live here (spec §4.2).
pub struct AgentLoop {
    queue: Arc<MessageQueue>,
    permissions: Arc<PermissionManager>,
    orchestrator: Arc<ToolOrchestrator>,
    model_handler: Arc<dyn ModelHandler>,
    context: Arc<Mutex<ArticleContext>>,
    compressor: Compressor,
    response_channels: DashMap<MessageId, UnboundedSender<AgentResponse>>,
    cancellations: DashMap<MessageId, CancellationToken>,
    state: Mutex<LoopState>,
    stats: Mutex<Stats>,
}

impl AgentLoop {
    pub fn new(
        queue: Arc<MessageQueue>,
        permissions: Arc<PermissionManager>,
        orchestrator: Arc<ToolOrchestrator>,
        model_handler: Arc<dyn ModelHandler>,
        context: Arc<Mutex<ArticleContext>>,
    ) -> Self {
        Self {
            queue,
            permissions,
            orchestrator,
            model_handler,
            context,
            compressor: Compressor::default(),
            response_channels: DashMap::new(),
            cancellations: DashMap::new(),
            state: Mutex::new(LoopState::Idle),
            stats: Mutex::new(Stats {
                count: 0,
                ewma: Ewma::new(0.3),
                error_count: 0,
                last_activity: Utc::now(),
            }),
        }
    }

    pub async fn state(&self) -> LoopState {
        *self.state.lock().await
    }

    pub async fn stats(&self) -> SessionStats {
        let stats = self.stats.lock().await;
        SessionStats {
            message_count: stats.count,
            avg_response_ms: stats.ewma.value(),
            error_count: stats.error_count,
            last_activity: stats.last_activity,
        }
    }

    /// Enqueues `message` and returns the channel its `AgentResponse`
    /// events will be streamed on (spec §4.2 item 3, "lazily... a
    /// cancellable stream").
    pub async fn submit(&self, message: Message) -> UnboundedReceiver<AgentResponse> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.response_channels.insert(message.id, tx);
        if self.queue.enqueue(message).await.is_err() {
            self.response_channels.remove(&message.id);
        }
        rx
    }

    /// Signals cancellation for an in-flight message's handler.
    pub fn cancel(&self, message_id: MessageId) {
        if let Some(token) = self.cancellations.get(&message_id) {
            token.cancel();
        }
    }

    /// Drains the queue, dispatching one message at a time — a single
    /// Agent Loop task (spec §5, "parallel cooperative": one loop task
    /// dispatches, worker tasks do the I/O-bound work).
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.queue.dequeue().await {
                DequeueOutcome::Closed => {
                    *self.state.lock().await = LoopState::Stopped;
                    return;
                }
                DequeueOutcome::Message(message) => {
                    *self.state.lock().await = LoopState::Processing;
                    self.process(message).await;
                    // A failed handler must not leave the loop Processing.
                    *self.state.lock().await = LoopState::Idle;
                }
            }
        }
    }

    pub async fn close(&self) {
        self.queue.close().await;
    }

    async fn process(self: &Arc<Self>, message: Message) {
        let start = Instant::now();
        let message_id = message.id;
        let cancel = CancellationToken::new();
        self.cancellations.insert(message_id, cancel.clone());
        let out = self.response_channels.remove(&message_id).map(|(_, tx)| tx);

        let loop_ref = Arc::clone(self);
        let task_message = message.clone();
        let task_cancel = cancel.clone();
        let task_out = out.clone();
        let mut task = tokio::spawn(async move { loop_ref.dispatch(&task_message, task_cancel, task_out.as_ref()).await });

        let failed = tokio::select! {
            result = &mut task => result.is_err(),
            _ = cancel.cancelled() => {
                if tokio::time::timeout(CANCEL_GRACE, &mut task).await.is_err() {
                    warn!(message_id = %message_id, "handler exceeded cancellation grace period; detaching");
                }
                false
            }
        };

        self.cancellations.remove(&message_id);
        self.record_stats(start.elapsed(), failed).await;
        self.maybe_schedule_compression().await;
    }

    async fn record_stats(&self, elapsed: Duration, failed: bool) {
        let mut stats = self.stats.lock().await;
        stats.count += 1;
        stats.ewma.observe(elapsed.as_millis() as f64);
        if failed {
            stats.error_count += 1;
        }
        stats.last_activity = Utc::now();
    }

    async fn maybe_schedule_compression(&self) {
        let mut ctx = self.context.lock().await;
        if self.compressor.should_compress(&ctx) {
            let event = self.compressor.compress(&mut ctx);
            warn!(
                original_tokens = event.original_tokens,
                compressed_tokens = event.compressed_tokens,
                ratio = event.ratio,
                "compressed article context before next dequeue"
            );
        }
    }

    fn effective_mode(&self, message: &Message) -> Mode {
        if message.kind == MessageType::SlashCommand {
            if let Some(command) = message.payload.get("command").and_then(JsonValue::as_str) {
                if matches!(command, "outline" | "research" | "publish") {
                    return Mode::Plan;
                }
            }
        }
        self.permissions.mode()
    }

    fn route(message: &Message) -> HandlerKind {
        match message.kind {
            MessageType::SlashCommand => HandlerKind::SlashCommand,
            MessageType::TodoPlan
            | MessageType::TodoExecute
            | MessageType::TodoUpdate
            | MessageType::TodoComplete
            | MessageType::TodoSummary => HandlerKind::TodoSubtype,
            MessageType::UserInput | MessageType::ToolResult | MessageType::AgentResponse => {
                match message.payload.get("intent").and_then(JsonValue::as_str) {
                    Some("article") => HandlerKind::ArticleRequest,
                    Some("edit") => HandlerKind::EditRequest,
                    Some("research") => HandlerKind::ResearchRequest,
                    _ => HandlerKind::GeneralQuery,
                }
            }
        }
    }

    async fn dispatch(self: Arc<Self>, message: &Message, cancel: CancellationToken, out: Option<&UnboundedSender<AgentResponse>>) {
        let effective_mode = self.effective_mode(message);
        if effective_mode == Mode::Plan && self.permissions.mode() != Mode::Plan {
            self.permissions.transition_mode(Mode::Plan);
        }

        if effective_mode == Mode::Plan && message.kind == MessageType::SlashCommand {
            if let Some(out) = out {
                let _ = out.send(self.plan_prompt(message));
            }
            return;
        }

        match Self::route(message) {
            HandlerKind::TodoSubtype => {
                if let Some(out) = out {
                    let _ = out.send(todo_response(message));
                }
            }
            kind => {
                if let Some(out) = out {
                    self.model_handler.handle(kind, message, cancel, out).await;
                }
            }
        }
    }

    /// Plan-mode handler: lists allowed tools plus `exit_plan_mode` (spec
    /// §4.2, "Plan-mode handler additionally...").
    fn plan_prompt(&self, message: &Message) -> AgentResponse {
        let command = message.payload.get("command").and_then(JsonValue::as_str).unwrap_or("outline");
        let mut tools = self.orchestrator.registered_tool_names();
        tools.sort();
        tools.push("exit_plan_mode".to_string());
        AgentResponse::prompt(
            format!("Planning for /{command}. Review the proposed steps before any writes happen."),
            json!({"command": command, "allowed_tools": tools}),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use writeflow_protocol::Priority;

    use super::*;
    use crate::tools::orchestrator::ToolRegistry;

    struct EchoHandler;

    #[async_trait]
    impl ModelHandler for EchoHandler {
        async fn handle(&self, kind: HandlerKind, message: &Message, _cancel: CancellationToken, out: &UnboundedSender<AgentResponse>) {
            let _ = out.send(AgentResponse::result(format!("{kind:?}:{}", message.payload)));
        }
    }

    struct HangingHandler;

    #[async_trait]
    impl ModelHandler for HangingHandler {
        async fn handle(&self, _kind: HandlerKind, _message: &Message, cancel: CancellationToken, _out: &UnboundedSender<AgentResponse>) {
            cancel.cancelled().await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    fn agent_loop(handler: Arc<dyn ModelHandler>) -> Arc<AgentLoop> {
        let queue = Arc::new(MessageQueue::new(16));
        let permissions = Arc::new(PermissionManager::new(vec![], PathBuf::from(".")));
        let orchestrator = Arc::new(ToolOrchestrator::new(Arc::new(ToolRegistry::new()), Arc::clone(&permissions), PathBuf::from(".")));
        let context = Arc::new(Mutex::new(ArticleContext::new()));
        Arc::new(AgentLoop::new(queue, permissions, orchestrator, handler, context))
    }

    #[tokio::test]
    async fn general_query_routes_through_model_handler() {
        let agent = agent_loop(Arc::new(EchoHandler));
        let runner = Arc::clone(&agent);
        tokio::spawn(runner.run());

        let message = Message::new(MessageType::UserInput, Priority::Normal, json!({"text": "hi"}), "cli");
        let mut rx = agent.submit(message).await;
        let response = rx.recv().await.unwrap();
        assert_eq!(response.kind, writeflow_protocol::AgentResponseKind::Result);
        assert!(response.content.contains("GeneralQuery"));

        agent.close().await;
    }

    #[tokio::test]
    async fn slash_command_for_outline_forces_plan_and_emits_prompt() {
        let agent = agent_loop(Arc::new(EchoHandler));
        let runner = Arc::clone(&agent);
        tokio::spawn(runner.run());

        let message = Message::new(MessageType::SlashCommand, Priority::Normal, json!({"command": "outline"}), "cli");
        let mut rx = agent.submit(message).await;
        let response = rx.recv().await.unwrap();
        assert_eq!(response.kind, writeflow_protocol::AgentResponseKind::Prompt);
        assert!(response.metadata["allowed_tools"].as_array().unwrap().iter().any(|t| t == "exit_plan_mode"));
        assert_eq!(agent.permissions.mode(), Mode::Plan);

        agent.close().await;
    }

    #[tokio::test]
    async fn todo_messages_route_without_the_model_handler() {
        let agent = agent_loop(Arc::new(EchoHandler));
        let runner = Arc::clone(&agent);
        tokio::spawn(runner.run());

        let message = Message::new(MessageType::TodoSummary, Priority::Normal, json!({"content": "done"}), "todo_engine");
        let mut rx = agent.submit(message).await;
        let response = rx.recv().await.unwrap();
        assert_eq!(response.kind, writeflow_protocol::AgentResponseKind::Summary);
        assert_eq!(response.content, "done");

        agent.close().await;
    }

    #[tokio::test]
    async fn stats_update_after_each_message() {
        let agent = agent_loop(Arc::new(EchoHandler));
        let runner = Arc::clone(&agent);
        tokio::spawn(runner.run());

        let message = Message::new(MessageType::UserInput, Priority::Normal, json!({}), "cli");
        let mut rx = agent.submit(message).await;
        let _ = rx.recv().await.unwrap();

        // Give the loop a moment to finish bookkeeping after the handler returns.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = agent.stats().await;
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.error_count, 0);

        agent.close().await;
    }

    #[tokio::test]
    async fn cancellation_detaches_after_grace_period() {
        let agent = agent_loop(Arc::new(HangingHandler));
        let runner = Arc::clone(&agent);
        tokio::spawn(runner.run());

        let message = Message::new(MessageType::UserInput, Priority::Normal, json!({}), "cli");
        let message_id = message.id;
        let _rx = agent.submit(message).await;

        // Give the loop time to start processing, then cancel.
        tokio::time::sleep(Duration::from_millis(20)).await;
        agent.cancel(message_id);

        // `process` should return (and state settle to Idle) well before
        // the handler's 3600s sleep, bounded by CANCEL_GRACE.
        let settled = tokio::time::timeout(Duration::from_secs(6), async {
            loop {
                if agent.state().await == LoopState::Idle {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(settled.is_ok(), "loop should return to Idle once the grace period elapses");

        agent.close().await;
    }
}

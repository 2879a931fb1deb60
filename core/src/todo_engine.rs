//! Todo/Task Engine (spec §4.7): a sub-agent layered over the Message
//! Queue providing strict sequential execution of the todo list while
//! preserving invariant I1 (only one `InProgress` at a time).

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use writeflow_protocol::Message;
use writeflow_protocol::MessageType;
use writeflow_protocol::Priority;
use writeflow_protocol::Todo;
use writeflow_protocol::TodoId;
use writeflow_protocol::TodoStatus;

use crate::queue::MessageQueue;

const MINUTES_PER_TODO: i64 = 2;

pub struct TodoEngine {
    todos: Mutex<Vec<Todo>>,
    queue: Arc<MessageQueue>,
}

impl TodoEngine {
    pub fn new(queue: Arc<MessageQueue>) -> Self {
        Self {
            todos: Mutex::new(Vec::new()),
            queue,
        }
    }

    pub async fn set_todos(&self, todos: Vec<Todo>) {
        *self.todos.lock().await = todos;
    }

    pub async fn snapshot(&self) -> Vec<Todo> {
        self.todos.lock().await.clone()
    }

    /// `startTodoQueueExecution` (spec §4.7).
    pub async fn start_queue_execution(&self) {
        let ordered = {
            let todos = self.todos.lock().await;
            let mut pending: Vec<Todo> = todos.iter().filter(|t| t.status == TodoStatus::Pending).cloned().collect();
            pending.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()).then_with(|| a.created_at.cmp(&b.created_at)));
            pending
        };

        if ordered.is_empty() {
            return;
        }

        let plan_payload = json!({
            "todos": ordered.iter().map(|t| json!({"id": t.id.to_string(), "content": t.content})).collect::<Vec<_>>(),
            "estimated_minutes": ordered.len() as i64 * MINUTES_PER_TODO,
        });
        let _ = self
            .queue
            .enqueue(Message::new(MessageType::TodoPlan, Priority::High, plan_payload, "todo_engine"))
            .await;

        self.start_next(ordered[0].id).await;
    }

    /// Marks `todo_id` `InProgress` and emits its `TodoExecute` message.
    /// Only ever called with at most one outstanding `InProgress` todo
    /// (invariant I1).
    async fn start_next(&self, todo_id: TodoId) {
        let content = {
            let mut todos = self.todos.lock().await;
            let Some(todo) = todos.iter_mut().find(|t| t.id == todo_id) else {
                return;
            };
            todo.status = TodoStatus::InProgress;
            todo.updated_at = Utc::now();
            todo.content.clone()
        };
        let payload = json!({"id": todo_id.to_string(), "content": content});
        let _ = self
            .queue
            .enqueue(Message::new(MessageType::TodoExecute, Priority::Normal, payload, "todo_engine"))
            .await;
    }

    /// Handles a `TodoComplete` message for `todo_id`: transitions it to
    /// `Completed`, then advances to the next `Pending` todo, or emits
    /// `TodoSummary` when none remain.
    pub async fn complete(&self, todo_id: TodoId) {
        let next_id = {
            let mut todos = self.todos.lock().await;
            if let Some(todo) = todos.iter_mut().find(|t| t.id == todo_id) {
                todo.status = TodoStatus::Completed;
                todo.updated_at = Utc::now();
            }
            todos.iter().find(|t| t.status == TodoStatus::Pending).map(|t| t.id)
        };

        match next_id {
            Some(id) => self.start_next(id).await,
            None => {
                let summary = self.summary_payload().await;
                let _ = self
                    .queue
                    .enqueue(Message::new(MessageType::TodoSummary, Priority::Normal, summary, "todo_engine"))
                    .await;
            }
        }
    }

    async fn summary_payload(&self) -> serde_json::Value {
        let todos = self.todos.lock().await;
        let completed = todos.iter().filter(|t| t.status == TodoStatus::Completed).count();
        json!({"completed": completed, "total": todos.len()})
    }

    /// Number of todos currently `InProgress` — used by tests and callers
    /// asserting invariant I1.
    pub async fn in_progress_count(&self) -> usize {
        self.todos.lock().await.iter().filter(|t| t.status == TodoStatus::InProgress).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use writeflow_protocol::TodoPriority;

    use crate::queue::DequeueOutcome;

    fn todo(content: &str, priority: TodoPriority) -> Todo {
        Todo::new(content, format!("doing {content}"), priority)
    }

    async fn next_message(queue: &MessageQueue) -> Message {
        match queue.dequeue().await {
            DequeueOutcome::Message(m) => m,
            DequeueOutcome::Closed => panic!("unexpected close"),
        }
    }

    #[tokio::test]
    async fn start_queue_execution_orders_by_priority_then_created_at() {
        let queue = Arc::new(MessageQueue::new(16));
        let engine = TodoEngine::new(Arc::clone(&queue));
        let low = todo("low", TodoPriority::Low);
        let high = todo("high", TodoPriority::High);
        engine.set_todos(vec![low, high]).await;

        engine.start_queue_execution().await;

        let plan = next_message(&queue).await;
        assert_eq!(plan.kind, MessageType::TodoPlan);
        assert_eq!(plan.priority, Priority::High);

        let execute = next_message(&queue).await;
        assert_eq!(execute.kind, MessageType::TodoExecute);
        assert_eq!(execute.payload["content"], "high");
        assert_eq!(engine.in_progress_count().await, 1);
    }

    #[tokio::test]
    async fn complete_advances_to_next_then_summarizes() {
        let queue = Arc::new(MessageQueue::new(16));
        let engine = TodoEngine::new(Arc::clone(&queue));
        let first = todo("first", TodoPriority::High);
        let second = todo("second", TodoPriority::Medium);
        let first_id = first.id;
        let second_id = second.id;
        engine.set_todos(vec![first, second]).await;

        engine.start_queue_execution().await;
        let _plan = next_message(&queue).await;
        let _execute_first = next_message(&queue).await;
        assert_eq!(engine.in_progress_count().await, 1);

        engine.complete(first_id).await;
        let execute_second = next_message(&queue).await;
        assert_eq!(execute_second.kind, MessageType::TodoExecute);
        assert_eq!(execute_second.payload["content"], "second");
        // Exactly one InProgress at a time (I1): first completed, second now InProgress.
        assert_eq!(engine.in_progress_count().await, 1);

        engine.complete(second_id).await;
        let summary = next_message(&queue).await;
        assert_eq!(summary.kind, MessageType::TodoSummary);
        assert_eq!(summary.payload["completed"], 2);
        assert_eq!(engine.in_progress_count().await, 0);
    }
}

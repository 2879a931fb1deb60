//! Stable state hashing used to decide when to clear a category's dedup
//! keys (spec §4.8, "todo-state hash change").

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use writeflow_protocol::Todo;
use writeflow_protocol::TodoStatus;

/// Hashes each todo's id, status, and priority — content edits to a
/// todo's text do not require re-firing todo reminders, only status/order
/// changes do.
pub fn todo_state_hash(todos: &[Todo]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for todo in todos {
        todo.id.hash(&mut hasher);
        status_discriminant(todo.status).hash(&mut hasher);
        todo.priority.weight().hash(&mut hasher);
    }
    hasher.finish()
}

fn status_discriminant(status: TodoStatus) -> u8 {
    match status {
        TodoStatus::Pending => 0,
        TodoStatus::InProgress => 1,
        TodoStatus::Completed => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pretty_assertions::assert_ne;
    use writeflow_protocol::TodoPriority;

    #[test]
    fn identical_state_hashes_equal() {
        let todos = vec![Todo::new("a", "doing a", TodoPriority::High)];
        assert_eq!(todo_state_hash(&todos), todo_state_hash(&todos));
    }

    #[test]
    fn status_change_changes_hash() {
        let mut todos = vec![Todo::new("a", "doing a", TodoPriority::High)];
        let before = todo_state_hash(&todos);
        todos[0].status = TodoStatus::InProgress;
        let after = todo_state_hash(&todos);
        assert_ne!(before, after);
    }
}

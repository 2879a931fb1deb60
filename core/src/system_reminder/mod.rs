//! System Reminder Engine (spec §4.8): a fixed panel of generators run
//! concurrently per state transition, each bounded by a timeout so one
//! slow generator cannot block the turn.

pub mod generators;
pub mod throttle;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use writeflow_protocol::ReminderCategory;
use writeflow_protocol::ReminderTrigger;
use writeflow_protocol::SystemReminder;

pub const DEFAULT_MAX_REMINDERS_PER_SESSION: u32 = 10;
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(1);

/// One reminder source. `dedup_key` must be stable for a given trigger so
/// repeated firings of the same state are suppressed until the state
/// changes (spec §4.8).
#[async_trait]
pub trait AttachmentGenerator: Send + Sync {
    fn category(&self) -> ReminderCategory;
    fn dedup_key(&self, trigger: &ReminderTrigger) -> Option<String>;
    async fn generate(&self, trigger: &ReminderTrigger) -> Option<SystemReminder>;
}

struct State {
    emitted_keys: HashSet<String>,
    emitted_count: u32,
}

pub struct ReminderEngine {
    generators: Vec<Arc<dyn AttachmentGenerator>>,
    max_per_session: u32,
    generator_timeout: Duration,
    state: Mutex<State>,
}

impl ReminderEngine {
    pub fn new(generators: Vec<Arc<dyn AttachmentGenerator>>) -> Self {
        Self {
            generators,
            max_per_session: DEFAULT_MAX_REMINDERS_PER_SESSION,
            generator_timeout: DEFAULT_GENERATOR_TIMEOUT,
            state: Mutex::new(State {
                emitted_keys: HashSet::new(),
                emitted_count: 0,
            }),
        }
    }

    /// Runs every generator against `trigger`, swallowing failures and
    /// timeouts per generator, honoring the session cap and per-key
    /// dedup. A `TodoChanged` trigger clears previously emitted `Todo`
    /// dedup keys before evaluating (spec §4.8, "any todo-state hash
    /// change clears todo-reminder keys").
    pub async fn on_trigger(&self, trigger: ReminderTrigger) -> Vec<SystemReminder> {
        if let ReminderTrigger::TodoChanged { .. } = &trigger {
            let todo_keys: Vec<String> = self
                .generators
                .iter()
                .filter(|g| g.category() == ReminderCategory::Todo)
                .filter_map(|g| g.dedup_key(&trigger))
                .collect();
            let mut state = self.state.lock().await;
            for key in &todo_keys {
                state.emitted_keys.remove(key);
            }
        }

        let futures = self.generators.iter().map(|generator| {
            let generator = Arc::clone(generator);
            let trigger = trigger.clone();
            async move { tokio::time::timeout(self.generator_timeout, generator.generate(&trigger)).await }
        });
        let results = futures::future::join_all(futures).await;

        let mut emitted = Vec::new();
        let mut state = self.state.lock().await;
        for (generator, result) in self.generators.iter().zip(results) {
            if state.emitted_count >= self.max_per_session {
                break;
            }
            let reminder = match result {
                Ok(Some(reminder)) => reminder,
                Ok(None) => continue,
                Err(_) => {
                    debug!(category = ?generator.category(), "reminder generator timed out");
                    continue;
                }
            };
            if let Some(key) = generator.dedup_key(&trigger) {
                if !state.emitted_keys.insert(key) {
                    continue;
                }
            }
            state.emitted_count += 1;
            emitted.push(reminder);
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use writeflow_protocol::Priority;

    struct AlwaysFires {
        category: ReminderCategory,
    }

    #[async_trait]
    impl AttachmentGenerator for AlwaysFires {
        fn category(&self) -> ReminderCategory {
            self.category
        }
        fn dedup_key(&self, _trigger: &ReminderTrigger) -> Option<String> {
            Some(format!("{:?}", self.category))
        }
        async fn generate(&self, _trigger: &ReminderTrigger) -> Option<SystemReminder> {
            Some(SystemReminder::new(self.category, Priority::Low, "reminder"))
        }
    }

    struct NeverFires;

    #[async_trait]
    impl AttachmentGenerator for NeverFires {
        fn category(&self) -> ReminderCategory {
            ReminderCategory::Session
        }
        fn dedup_key(&self, _trigger: &ReminderTrigger) -> Option<String> {
            None
        }
        async fn generate(&self, _trigger: &ReminderTrigger) -> Option<SystemReminder> {
            None
        }
    }

    struct HangsForever;

    #[async_trait]
    impl AttachmentGenerator for HangsForever {
        fn category(&self) -> ReminderCategory {
            ReminderCategory::Session
        }
        fn dedup_key(&self, _trigger: &ReminderTrigger) -> Option<String> {
            None
        }
        async fn generate(&self, _trigger: &ReminderTrigger) -> Option<SystemReminder> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            None
        }
    }

    #[tokio::test]
    async fn dedup_suppresses_repeat_emission() {
        let engine = ReminderEngine::new(vec![Arc::new(AlwaysFires { category: ReminderCategory::Session })]);
        let first = engine.on_trigger(ReminderTrigger::SessionStartup).await;
        let second = engine.on_trigger(ReminderTrigger::SessionStartup).await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0);
    }

    #[tokio::test]
    async fn todo_changed_clears_todo_dedup_keys() {
        let engine = ReminderEngine::new(vec![Arc::new(AlwaysFires { category: ReminderCategory::Todo })]);
        let first = engine.on_trigger(ReminderTrigger::TodoChanged { state_hash: 1 }).await;
        let second = engine.on_trigger(ReminderTrigger::TodoChanged { state_hash: 1 }).await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1, "a new todo state hash must re-fire the todo generator");
    }

    #[tokio::test]
    async fn slow_generator_is_swallowed_not_blocking() {
        let engine = ReminderEngine::new(vec![Arc::new(HangsForever), Arc::new(NeverFires)]);
        let started = std::time::Instant::now();
        let reminders = engine.on_trigger(ReminderTrigger::SessionStartup).await;
        assert!(reminders.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2), "timeout must bound the slow generator");
    }

    #[tokio::test]
    async fn session_cap_limits_total_reminders() {
        let generators: Vec<Arc<dyn AttachmentGenerator>> = (0..15)
            .map(|i| Arc::new(DistinctFires { id: i }) as Arc<dyn AttachmentGenerator>)
            .collect();
        let engine = ReminderEngine::new(generators);
        let reminders = engine.on_trigger(ReminderTrigger::SessionStartup).await;
        assert_eq!(reminders.len(), DEFAULT_MAX_REMINDERS_PER_SESSION as usize);
    }

    struct DistinctFires {
        id: u32,
    }

    #[async_trait]
    impl AttachmentGenerator for DistinctFires {
        fn category(&self) -> ReminderCategory {
            ReminderCategory::Session
        }
        fn dedup_key(&self, _trigger: &ReminderTrigger) -> Option<String> {
            Some(format!("distinct-{}", self.id))
        }
        async fn generate(&self, _trigger: &ReminderTrigger) -> Option<SystemReminder> {
            Some(SystemReminder::new(ReminderCategory::Session, Priority::Low, "r"))
        }
    }
}

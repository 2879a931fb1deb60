//! Wire and in-process data types shared across the WriteFlow agent
//! runtime crates. Kept dependency-light (serde + chrono + uuid +
//! thiserror) so every other crate in the workspace can depend on it
//! without pulling in tokio or provider HTTP clients.

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod ids;
pub mod message;
pub mod mode;
pub mod execution;
pub mod reminder;
pub mod stream;
pub mod todo;
pub mod tool;

pub use config::Config;
pub use config::ModelProfile;
pub use config::ModelPointers;
pub use context::ArticleContext;
pub use context::CompressionEvent;
pub use context::Reference;
pub use context::ResearchItem;
pub use context::ToolUsage;
pub use error::ErrorKind;
pub use error::Result;
pub use error::RuntimeError;
pub use event::AgentResponse;
pub use event::AgentResponseKind;
pub use ids::ExecutionId;
pub use ids::MessageId;
pub use ids::SessionId;
pub use ids::StreamId;
pub use ids::TodoId;
pub use message::Message;
pub use message::MessageType;
pub use message::Priority;
pub use mode::Mode;
pub use execution::ExecutionMetrics;
pub use execution::ExecutionRecord;
pub use execution::ExecutionState;
pub use reminder::ReminderCategory;
pub use reminder::ReminderTrigger;
pub use reminder::SystemReminder;
pub use stream::StreamChunk;
pub use stream::Usage;
pub use todo::Todo;
pub use todo::TodoPriority;
pub use todo::TodoStatus;
pub use tool::GrantType;
pub use tool::PermissionDecision;
pub use tool::PermissionLevel;
pub use tool::PermissionPolicy;

//! Provider adapters and the Stream Multiplexer (spec §4.5).

pub mod anthropic;
pub mod gemini;
pub mod multiplexer;
pub mod openai_compatible;
pub mod registry;
pub mod retry;
pub mod rechunk;
pub mod sse;
pub mod toolcall;

use serde_json::Value as JsonValue;
use writeflow_protocol::Usage;

/// Per-stream mutable scratch space an adapter needs between successive
/// `parse_chunk` calls: partial line buffers, Gemini's balanced-brace
/// buffer, and the cumulative text Gemini already emitted.
#[derive(Debug, Default)]
pub struct AdapterState {
    pub line_buffer: String,
    pub brace_buffer: String,
    pub accumulated_text: String,
    pub last_event_name: Option<String>,
}

/// One normalized unit parsed out of a provider's raw wire format, before
/// re-chunking or tool-call detection.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Content(String),
    Reasoning(String),
    Usage(Usage),
    Done,
}

/// `{name, transform_request, parse_stream_chunk}` (spec §4.5 [ADDED]).
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Builds the provider-specific request body from a model profile and
    /// a normalized message list.
    fn transform_request(&self, model_name: &str, messages: &[JsonValue]) -> JsonValue;

    /// Feeds one network read's worth of raw bytes/text through the
    /// adapter's framing, returning zero or more normalized events.
    fn parse_chunk(&self, raw: &str, state: &mut AdapterState) -> Vec<ProviderEvent>;
}

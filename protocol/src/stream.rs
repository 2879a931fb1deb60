use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorKind;
use crate::ids::StreamId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cache_hit_tokens: Option<u64>,
    pub cache_miss_tokens: Option<u64>,
}

/// Normalized streaming unit produced by the Stream Multiplexer (spec §3,
/// StreamChunk; §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub stream_id: StreamId,
    pub content_delta: String,
    pub reasoning_delta: Option<String>,
    pub done: bool,
    pub error: Option<ErrorKind>,
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn delta(stream_id: StreamId, content_delta: impl Into<String>) -> Self {
        Self {
            stream_id,
            content_delta: content_delta.into(),
            reasoning_delta: None,
            done: false,
            error: None,
            usage: None,
        }
    }

    pub fn terminal(stream_id: StreamId, usage: Option<Usage>) -> Self {
        Self {
            stream_id,
            content_delta: String::new(),
            reasoning_delta: None,
            done: true,
            error: None,
            usage,
        }
    }
}

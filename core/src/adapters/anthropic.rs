//! Anthropic Messages API adapter — preserves event-typed SSE frames
//! (spec §4.5: `content_block_delta` → contentDelta, `message_stop` →
//! done).

use serde_json::Value as JsonValue;
use serde_json::json;

use crate::adapters::AdapterState;
use crate::adapters::ProviderAdapter;
use crate::adapters::ProviderEvent;
use crate::adapters::sse;

pub struct AnthropicAdapter;

impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn transform_request(&self, model_name: &str, messages: &[JsonValue]) -> JsonValue {
        json!({
            "model": model_name,
            "messages": messages,
            "stream": true,
            "max_tokens": 4096,
        })
    }

    fn parse_chunk(&self, raw: &str, state: &mut AdapterState) -> Vec<ProviderEvent> {
        let mut events = Vec::new();
        for line in sse::feed_lines(&mut state.line_buffer, raw) {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(event_name) = trimmed.strip_prefix("event:") {
                state.last_event_name = Some(event_name.trim().to_string());
                continue;
            }
            let Some(payload) = trimmed.strip_prefix("data:") else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<JsonValue>(payload.trim()) else {
                continue;
            };
            match state.last_event_name.as_deref() {
                Some("content_block_delta") => {
                    if let Some(text) = value["delta"]["text"].as_str() {
                        if !text.is_empty() {
                            events.push(ProviderEvent::Content(text.to_string()));
                        }
                    }
                    if let Some(thinking) = value["delta"]["thinking"].as_str() {
                        if !thinking.is_empty() {
                            events.push(ProviderEvent::Reasoning(thinking.to_string()));
                        }
                    }
                }
                Some("message_stop") => {
                    events.push(ProviderEvent::Done);
                }
                _ => {}
            }
        }
        events
    }
}

//! Adapter for OpenAI chat-completions-compatible endpoints (OpenAI,
//! DeepSeek, Kimi, Zhipu) — spec §4.5, "SSE family".

use serde_json::Value as JsonValue;
use serde_json::json;
use writeflow_protocol::Usage;

use crate::adapters::AdapterState;
use crate::adapters::ProviderAdapter;
use crate::adapters::ProviderEvent;
use crate::adapters::sse;

pub struct OpenAiCompatibleAdapter {
    provider: &'static str,
}

impl OpenAiCompatibleAdapter {
    pub fn new(provider: &'static str) -> Self {
        Self { provider }
    }
}

impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn name(&self) -> &str {
        self.provider
    }

    fn transform_request(&self, model_name: &str, messages: &[JsonValue]) -> JsonValue {
        json!({
            "model": model_name,
            "messages": messages,
            "stream": true,
        })
    }

    fn parse_chunk(&self, raw: &str, state: &mut AdapterState) -> Vec<ProviderEvent> {
        let mut events = Vec::new();
        for line in sse::feed_lines(&mut state.line_buffer, raw) {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(':') {
                continue;
            }
            let Some(payload) = trimmed.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload == "[DONE]" {
                events.push(ProviderEvent::Done);
                continue;
            }
            let Ok(value) = serde_json::from_str::<JsonValue>(payload) else {
                continue;
            };
            let delta = &value["choices"][0]["delta"];
            if let Some(content) = delta.get("content").and_then(JsonValue::as_str) {
                if !content.is_empty() {
                    events.push(ProviderEvent::Content(content.to_string()));
                }
            }
            if let Some(reasoning) = delta.get("reasoning_content").and_then(JsonValue::as_str) {
                if !reasoning.is_empty() {
                    events.push(ProviderEvent::Reasoning(reasoning.to_string()));
                }
            }
            if let Some(usage) = value.get("usage") {
                events.push(ProviderEvent::Usage(Usage {
                    prompt_tokens: usage.get("prompt_tokens").and_then(JsonValue::as_u64).unwrap_or(0),
                    completion_tokens: usage.get("completion_tokens").and_then(JsonValue::as_u64).unwrap_or(0),
                    cache_hit_tokens: usage.get("prompt_cache_hit_tokens").and_then(JsonValue::as_u64),
                    cache_miss_tokens: usage.get("prompt_cache_miss_tokens").and_then(JsonValue::as_u64),
                }));
            }
            if value["choices"][0].get("finish_reason").is_some_and(|v| !v.is_null()) {
                events.push(ProviderEvent::Done);
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_content_delta_and_done() {
        let adapter = OpenAiCompatibleAdapter::new("openai");
        let mut state = AdapterState::default();
        let raw = "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\ndata: [DONE]\n\n";
        let events = adapter.parse_chunk(raw, &mut state);
        assert_eq!(events, vec![ProviderEvent::Content("hi".to_string()), ProviderEvent::Done]);
    }

    #[test]
    fn parses_deepseek_reasoning_extension() {
        let adapter = OpenAiCompatibleAdapter::new("deepseek");
        let mut state = AdapterState::default();
        let raw = "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"thinking\"}}]}\n\n";
        let events = adapter.parse_chunk(raw, &mut state);
        assert_eq!(events, vec![ProviderEvent::Reasoning("thinking".to_string())]);
    }

    #[test]
    fn ignores_blank_and_comment_lines() {
        let adapter = OpenAiCompatibleAdapter::new("openai");
        let mut state = AdapterState::default();
        let events = adapter.parse_chunk(": keep-alive\n\n", &mut state);
        assert!(events.is_empty());
    }

    #[test]
    fn buffers_partial_lines_across_calls() {
        let adapter = OpenAiCompatibleAdapter::new("openai");
        let mut state = AdapterState::default();
        assert!(adapter.parse_chunk("data: {\"choices\":[{\"delta\":{\"content\":\"h", &mut state).is_empty());
        let events = adapter.parse_chunk("i\"}}]}\n\n", &mut state);
        assert_eq!(events, vec![ProviderEvent::Content("hi".to_string())]);
    }
}

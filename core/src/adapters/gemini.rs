//! Gemini generate-content adapter — scans a streaming buffer of
//! concatenated JSON objects rather than SSE lines, and de-duplicates
//! Gemini's cumulative text (spec §4.5).

use serde_json::Value as JsonValue;
use serde_json::json;

use crate::adapters::AdapterState;
use crate::adapters::ProviderAdapter;
use crate::adapters::ProviderEvent;

pub struct GeminiAdapter;

impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn transform_request(&self, _model_name: &str, messages: &[JsonValue]) -> JsonValue {
        json!({
            "contents": messages,
        })
    }

    fn parse_chunk(&self, raw: &str, state: &mut AdapterState) -> Vec<ProviderEvent> {
        state.brace_buffer.push_str(raw);
        let mut events = Vec::new();

        while let Some((object, consumed)) = take_balanced_object(&state.brace_buffer) {
            state.brace_buffer.drain(..consumed);
            let Ok(value) = serde_json::from_str::<JsonValue>(&object) else {
                continue;
            };
            let candidate = &value["candidates"][0];
            let full_text: String = candidate["content"]["parts"]
                .as_array()
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(JsonValue::as_str))
                        .collect::<String>()
                })
                .unwrap_or_default();

            if !full_text.is_empty() {
                let suffix = if full_text.starts_with(state.accumulated_text.as_str()) {
                    &full_text[state.accumulated_text.len()..]
                } else {
                    full_text.as_str()
                };
                if !suffix.is_empty() {
                    events.push(ProviderEvent::Content(suffix.to_string()));
                }
                state.accumulated_text = full_text;
            }

            if candidate.get("finishReason").is_some_and(|v| !v.is_null()) {
                events.push(ProviderEvent::Done);
            }
        }

        events
    }
}

/// Scans for the first balanced, string-escape-aware `{...}` object in
/// `buffer`, ignoring any leading characters outside of an object (array
/// brackets, commas, whitespace). Returns the object text and the byte
/// length to drain, or `None` if no complete object is buffered yet.
fn take_balanced_object(buffer: &str) -> Option<(String, usize)> {
    let bytes: Vec<char> = buffer.chars().collect();
    let start = bytes.iter().position(|&c| c == '{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &c) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    let object: String = bytes[start..end].iter().collect();
                    let consumed_chars = end;
                    let consumed_bytes: usize = bytes[..consumed_chars].iter().map(|c| c.len_utf8()).sum();
                    return Some((object, consumed_bytes));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_single_object_across_array_wrapper() {
        let adapter = GeminiAdapter;
        let mut state = AdapterState::default();
        let raw = r#"[{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#;
        let events = adapter.parse_chunk(raw, &mut state);
        assert_eq!(events, vec![ProviderEvent::Content("hi".to_string())]);
    }

    #[test]
    fn deduplicates_cumulative_text() {
        let adapter = GeminiAdapter;
        let mut state = AdapterState::default();
        adapter.parse_chunk(r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#, &mut state);
        let events = adapter.parse_chunk(
            r#",{"candidates":[{"content":{"parts":[{"text":"hi there"}]}}]}"#,
            &mut state,
        );
        assert_eq!(events, vec![ProviderEvent::Content(" there".to_string())]);
    }

    #[test]
    fn finish_reason_terminates() {
        let adapter = GeminiAdapter;
        let mut state = AdapterState::default();
        let events = adapter.parse_chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"done"}]},"finishReason":"STOP"}]}"#,
            &mut state,
        );
        assert_eq!(events, vec![ProviderEvent::Content("done".to_string()), ProviderEvent::Done]);
    }

    #[test]
    fn buffers_incomplete_object_across_calls() {
        let adapter = GeminiAdapter;
        let mut state = AdapterState::default();
        assert!(adapter.parse_chunk(r#"{"candidates":[{"content":"#, &mut state).is_empty());
        let events = adapter.parse_chunk(r#"{"parts":[{"text":"ok"}]}}]}"#, &mut state);
        assert_eq!(events, vec![ProviderEvent::Content("ok".to_string())]);
    }
}

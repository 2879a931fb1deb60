//! Incremental tool-call JSON detection embedded in model output text
//! (spec §4.5, "Common pipeline"): balanced braces, string-escape aware,
//! recognized by a `todos` or `tool_name` key.

use serde_json::Value as JsonValue;

const RECOGNIZED_KEYS: &[&str] = &["todos", "tool_name"];

#[derive(Debug, Clone, PartialEq)]
pub enum TextSegment {
    Plain(String),
    ToolCall(JsonValue),
}

/// Splits `text` into plain-text runs and recognized tool-call JSON
/// objects. Candidate objects that parse but lack a recognized key are
/// left in place as plain text.
pub fn extract_tool_calls(text: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut plain_start = 0usize;
    let chars: Vec<char> = text.chars().collect();
    let byte_offsets: Vec<usize> = {
        let mut offsets = Vec::with_capacity(chars.len() + 1);
        let mut acc = 0usize;
        for c in &chars {
            offsets.push(acc);
            acc += c.len_utf8();
        }
        offsets.push(acc);
        offsets
    };

    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] != '{' {
            i += 1;
            continue;
        }
        match scan_object(&chars, i) {
            Some(end) => {
                let candidate: String = chars[i..end].iter().collect();
                if let Ok(value) = serde_json::from_str::<JsonValue>(&candidate) {
                    if is_tool_call_shape(&value) {
                        let plain_text: String = text[byte_offsets[plain_start]..byte_offsets[i]].to_string();
                        if !plain_text.is_empty() {
                            segments.push(TextSegment::Plain(plain_text));
                        }
                        segments.push(TextSegment::ToolCall(value));
                        plain_start = end;
                        i = end;
                        continue;
                    }
                }
                i += 1;
            }
            None => {
                i += 1;
            }
        }
    }

    let tail = &text[byte_offsets[plain_start]..];
    if !tail.is_empty() {
        segments.push(TextSegment::Plain(tail.to_string()));
    }
    segments
}

fn is_tool_call_shape(value: &JsonValue) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    RECOGNIZED_KEYS.iter().any(|key| obj.contains_key(*key))
}

/// Returns the exclusive end index (in `chars`) of the balanced object
/// starting at `start`, or `None` if unbalanced within the buffer.
fn scan_object(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &c) in chars[start..].iter().enumerate() {
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
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Accumulates streaming content so tool-call detection can run
/// incrementally: each `push` re-scans the buffered tail, emits any
/// segments that are clearly settled, and holds back a trailing `Plain`
/// run in case it turns out to be the prefix of a tool call split across
/// network chunks.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    pending: String,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &str) -> Vec<TextSegment> {
        self.pending.push_str(delta);
        let segments = extract_tool_calls(&self.pending);
        match segments.split_last() {
            Some((TextSegment::Plain(last), rest)) => {
                self.pending = last.clone();
                rest.to_vec()
            }
            _ => {
                self.pending.clear();
                segments
            }
        }
    }

    /// Call once the stream is done; releases any held-back plain text.
    pub fn flush(&mut self) -> Vec<TextSegment> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        vec![TextSegment::Plain(std::mem::take(&mut self.pending))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn plain_text_with_no_braces_is_one_segment() {
        let segments = extract_tool_calls("just some text");
        assert_eq!(segments, vec![TextSegment::Plain("just some text".to_string())]);
    }

    #[test]
    fn recognized_tool_call_is_separated_from_surrounding_text() {
        let text = r#"Here is the plan: {"tool_name":"search_research","query":"rust"} done."#;
        let segments = extract_tool_calls(text);
        assert_eq!(
            segments,
            vec![
                TextSegment::Plain("Here is the plan: ".to_string()),
                TextSegment::ToolCall(json!({"tool_name": "search_research", "query": "rust"})),
                TextSegment::Plain(" done.".to_string()),
            ]
        );
    }

    #[test]
    fn unrecognized_object_stays_plain() {
        let text = r#"note: {"foo":"bar"} end"#;
        let segments = extract_tool_calls(text);
        assert_eq!(segments, vec![TextSegment::Plain(text.to_string())]);
    }

    #[test]
    fn escaped_quotes_inside_string_do_not_break_scanning() {
        let text = r#"{"tool_name":"x","note":"say \"hi\""}"#;
        let segments = extract_tool_calls(text);
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], TextSegment::ToolCall(_)));
    }

    #[test]
    fn accumulator_holds_back_trailing_plain_text() {
        let mut acc = ToolCallAccumulator::new();
        let emitted = acc.push("plan: ");
        assert!(emitted.is_empty());
        let flushed = acc.flush();
        assert_eq!(flushed, vec![TextSegment::Plain("plan: ".to_string())]);
    }

    #[test]
    fn accumulator_emits_tool_call_split_across_pushes() {
        let mut acc = ToolCallAccumulator::new();
        assert!(acc.push(r#"go: {"tool_name":"x"#).is_empty());
        let emitted = acc.push(r#""} done"#);
        assert_eq!(
            emitted,
            vec![
                TextSegment::Plain("go: ".to_string()),
                TextSegment::ToolCall(json!({"tool_name": "x"})),
            ]
        );
        assert_eq!(acc.flush(), vec![TextSegment::Plain(" done".to_string())]);
    }
}

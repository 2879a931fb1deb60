//! Scoring formulas used by the Context Compressor (spec §4.6 items 2-3).

use chrono::DateTime;
use chrono::Utc;
use writeflow_protocol::Message;
use writeflow_protocol::MessageType;
use writeflow_protocol::ResearchItem;

const DIALOGUE_KEYWORDS: &[&str] = &["大纲", "outline", "写作", "研究", "发布"];

/// `recency = max(0, 1 − daysSinceCreated/30)`.
pub fn recency(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - created_at).num_seconds() as f64 / 86_400.0;
    (1.0 - days / 30.0).max(0.0)
}

/// `0.3×recency + 0.3×normalizedReferenceCount + 0.2×normalizedLength +
/// 0.2×relevanceScore`, where the two normalized terms are scaled against
/// the maximum seen across the current `researchMaterial` set.
pub fn research_item_score(item: &ResearchItem, now: DateTime<Utc>, max_reference_count: u32, max_body_len: usize) -> f64 {
    let normalized_reference_count = if max_reference_count > 0 {
        item.reference_count as f64 / max_reference_count as f64
    } else {
        0.0
    };
    let normalized_length = if max_body_len > 0 {
        item.body.chars().count() as f64 / max_body_len as f64
    } else {
        0.0
    };
    0.3 * recency(item.created_at, now) + 0.3 * normalized_reference_count + 0.2 * normalized_length + 0.2 * item.relevance_score
}

/// `1 + (isSlashCommand?2:0) + (len>500?1:0) + (containsKeyword?0.5:0)`.
pub fn dialogue_importance(msg: &Message) -> f64 {
    let is_slash_command = matches!(msg.kind, MessageType::SlashCommand);
    let text = message_text(msg);
    let len = text.chars().count();
    let contains_keyword = DIALOGUE_KEYWORDS.iter().any(|k| text.contains(k));

    1.0 + if is_slash_command { 2.0 } else { 0.0 } + if len > 500 { 1.0 } else { 0.0 } + if contains_keyword { 0.5 } else { 0.0 }
}

fn message_text(msg: &Message) -> String {
    match msg.token_payload() {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

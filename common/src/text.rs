//! Text-shrinking helpers shared by the Context Compressor and the File
//! Reference Resolver.

const ELISION_MARKER: &str = " … ";

/// Summarize `body` to at most `max_len` characters using a "head 70% +
/// tail 30%" split with an elision marker in between (spec §4.6 item 2).
/// Strings already within the budget are returned unchanged.
pub fn head_tail_summary(body: &str, max_len: usize) -> String {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() <= max_len {
        return body.to_string();
    }
    let marker_len = ELISION_MARKER.chars().count();
    let budget = max_len.saturating_sub(marker_len);
    let head_len = (budget as f64 * 0.7).round() as usize;
    let tail_len = budget.saturating_sub(head_len);

    let head: String = chars[..head_len.min(chars.len())].iter().collect();
    let tail_start = chars.len().saturating_sub(tail_len);
    let tail: String = chars[tail_start..].iter().collect();
    format!("{head}{ELISION_MARKER}{tail}")
}

/// Split `body` into sentences on CJK (`。`, `！`, `？`) and Latin (`.`,
/// `!`, `?`) terminators, returning up to `max` non-empty trimmed
/// sentences (spec §4.6 item 2, "up to 3 key sentences").
pub fn key_sentences(body: &str, max: usize) -> Vec<String> {
    const TERMINATORS: &[char] = &['。', '！', '？', '.', '!', '?'];
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in body.chars() {
        current.push(c);
        if TERMINATORS.contains(&c) {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                sentences.push(trimmed);
            }
            current.clear();
            if sentences.len() >= max {
                return sentences;
            }
        }
    }
    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() && sentences.len() < max {
        sentences.push(trimmed);
    }
    sentences
}

/// Truncate `body` to `max_len` characters, appending the elision marker
/// only when truncation actually occurred (used for reference articles,
/// spec §4.6 item 4 — a hard cut rather than a head/tail split).
pub fn truncate_chars(body: &str, max_len: usize) -> String {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() <= max_len {
        return body.to_string();
    }
    let mut out: String = chars[..max_len].iter().collect();
    out.push_str(ELISION_MARKER);
    out
}

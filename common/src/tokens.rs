//! Heuristic token estimation (spec §4.6, "Token estimation").
//!
//! CJK glyphs count as 1.5 tokens each, ASCII words as 0.75 tokens each,
//! everything else divided by 4. Implementations may swap a real
//! tokenizer as long as the ratios in §4.6 hold within a tolerance bound
//! (spec §9).

pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x3040..=0x30FF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
    )
}

/// Estimate the token count of a single string.
pub fn estimate_tokens(text: &str) -> f64 {
    let mut cjk_count = 0usize;
    let mut other_count = 0usize;
    let mut ascii_word_chars = 0usize;
    let mut in_ascii_word = false;
    let mut ascii_words = 0usize;

    for c in text.chars() {
        if is_cjk(c) {
            cjk_count += 1;
            if in_ascii_word {
                ascii_words += 1;
                in_ascii_word = false;
            }
        } else if c.is_ascii_alphanumeric() || c == '\'' {
            ascii_word_chars += 1;
            in_ascii_word = true;
        } else {
            if in_ascii_word {
                ascii_words += 1;
                in_ascii_word = false;
            }
            if !c.is_whitespace() {
                other_count += 1;
            }
        }
    }
    if in_ascii_word {
        ascii_words += 1;
    }
    let _ = ascii_word_chars;

    (cjk_count as f64) * 1.5 + (ascii_words as f64) * 0.75 + (other_count as f64) / 4.0
}

/// Estimate tokens across a collection of strings, summing per-item
/// estimates (used by the compressor when scoring/trimming arrays).
pub fn estimate_tokens_many<'a>(items: impl IntoIterator<Item = &'a str>) -> f64 {
    items.into_iter().map(estimate_tokens).sum()
}

/// Estimate tokens of an arbitrary JSON value by estimating its string
/// representation. Used when a Message's `payload`/`content` is a
/// structured object rather than plain text.
pub fn estimate_tokens_json(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::String(s) => estimate_tokens(s),
        serde_json::Value::Null => 0.0,
        other => estimate_tokens(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ascii_words_count_as_three_quarters() {
        // "hello world" -> 2 words -> 1.5 tokens
        assert_eq!(estimate_tokens("hello world"), 1.5);
    }

    #[test]
    fn cjk_glyphs_count_individually() {
        // 4 CJK glyphs -> 4 * 1.5 = 6.0
        assert_eq!(estimate_tokens("写作研究"), 6.0);
    }

    #[test]
    fn punctuation_divided_by_four() {
        // 4 punctuation marks -> 4/4 = 1.0
        assert_eq!(estimate_tokens("!!!!"), 1.0);
    }

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0.0);
    }
}

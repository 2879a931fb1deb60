//! Character-level re-chunking for UI fluidity (spec §4.5, "Common
//! pipeline"): split a content delta into 1–8 character pieces and spread
//! them over at most 10ms.

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChunk {
    pub text: String,
    /// Suggested delay, in milliseconds, before rendering this piece
    /// relative to the previous one.
    pub delay_ms: u8,
    pub text_type: &'static str,
}

const SPREAD_MS: u64 = 10;

fn chunk_size_for(len: usize) -> usize {
    match len {
        0..=4 => 1,
        5..=16 => 2,
        17..=64 => 4,
        _ => 8,
    }
}

fn text_type_of(piece: &str) -> &'static str {
    if piece.chars().any(writeflow_common::tokens::is_cjk) {
        "cjk"
    } else if piece.chars().all(|c| c.is_ascii()) {
        "ascii"
    } else {
        "mixed"
    }
}

/// Splits `delta` into sub-chunks, each carrying a rendering hint. Empty
/// input yields no chunks.
pub fn rechunk(delta: &str) -> Vec<RenderedChunk> {
    if delta.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = delta.chars().collect();
    let size = chunk_size_for(chars.len());
    let pieces: Vec<String> = chars.chunks(size).map(|c| c.iter().collect()).collect();

    let count = pieces.len() as u64;
    let base_delay = SPREAD_MS / count.max(1);
    let remainder = SPREAD_MS % count.max(1);

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let delay = base_delay + if (i as u64) < remainder { 1 } else { 0 };
            RenderedChunk {
                text_type: text_type_of(&text),
                text,
                delay_ms: delay as u8,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_delta_yields_no_chunks() {
        assert!(rechunk("").is_empty());
    }

    #[test]
    fn short_delta_splits_one_char_at_a_time() {
        let chunks = rechunk("hi");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "h");
        assert_eq!(chunks[1].text, "i");
    }

    #[test]
    fn total_delay_never_exceeds_spread_budget() {
        let chunks = rechunk("the quick brown fox jumps over the lazy dog and keeps running");
        let total: u64 = chunks.iter().map(|c| c.delay_ms as u64).sum();
        assert_eq!(total, SPREAD_MS);
    }

    #[test]
    fn cjk_glyphs_tagged_as_cjk() {
        let chunks = rechunk("你好");
        assert!(chunks.iter().all(|c| c.text_type == "cjk"));
    }
}

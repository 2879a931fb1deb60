//! Line-oriented SSE buffering shared by the OpenAI-compatible and
//! Anthropic adapters.

/// Appends `raw` to `buffer` and pulls out every complete line (terminated
/// by `\n`), leaving a trailing partial line in `buffer` for the next
/// call. `\r` is stripped from line endings.
pub fn feed_lines(buffer: &mut String, raw: &str) -> Vec<String> {
    buffer.push_str(raw);
    let mut lines = Vec::new();
    loop {
        let Some(idx) = buffer.find('\n') else {
            break;
        };
        let mut line: String = buffer.drain(..=idx).collect();
        line.pop(); // trailing \n
        if line.ends_with('\r') {
            line.pop();
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_complete_lines_and_keeps_partial() {
        let mut buf = String::new();
        let lines = feed_lines(&mut buf, "data: a\ndata: b\npartial");
        assert_eq!(lines, vec!["data: a", "data: b"]);
        assert_eq!(buf, "partial");
    }

    #[test]
    fn completes_partial_line_on_next_feed() {
        let mut buf = String::new();
        feed_lines(&mut buf, "data: a\ndata: b");
        let lines = feed_lines(&mut buf, "c\n");
        assert_eq!(lines, vec!["data: bc"]);
    }

    #[test]
    fn strips_carriage_return() {
        let mut buf = String::new();
        let lines = feed_lines(&mut buf, "data: a\r\n");
        assert_eq!(lines, vec!["data: a"]);
    }
}

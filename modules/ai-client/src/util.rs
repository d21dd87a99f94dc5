/// Keep at most `max_chars` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Pull the JSON object out of a model reply.
///
/// Local models sometimes wrap JSON in markdown fences or add a sentence of
/// chatter around it even in JSON mode. Returns the trimmed reply unchanged
/// when no braces are found so the caller's parse error shows the raw text.
pub fn json_payload(response: &str) -> &str {
    let trimmed = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let text = "Grüße aus Köln";
        assert_eq!(truncate_chars(text, 5), "Grüße");
    }

    #[test]
    fn truncate_shorter_input_is_untouched() {
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn json_payload_strips_fences() {
        assert_eq!(json_payload("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(json_payload("```\n{}\n```"), "{}");
    }

    #[test]
    fn json_payload_drops_surrounding_chatter() {
        let reply = "Sure! Here is the result: {\"classification\": \"NOT_OPPORTUNITY\"} Hope it helps.";
        assert_eq!(
            json_payload(reply),
            "{\"classification\": \"NOT_OPPORTUNITY\"}"
        );
    }

    #[test]
    fn json_payload_without_braces_returns_trimmed_text() {
        assert_eq!(json_payload("  nope  "), "nope");
    }
}

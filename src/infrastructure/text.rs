//! Text helpers for model output and log previews

use once_cell::sync::Lazy;
use regex::Regex;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").unwrap());

/// Shorten `text` to at most `max_chars` characters, ending in `...` when cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

/// Reduce model output to the JSON object it carries
///
/// Handles bare JSON, fenced ```json blocks and objects surrounded by prose.
pub fn extract_json(text: &str) -> Option<&str> {
    let candidate = JSON_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;

    (start < end).then(|| &candidate[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_text("abcdefghijk", 10), "abcdefg...");
        assert_eq!(truncate_text("ééééé", 4), "é...");
    }

    #[test]
    fn test_extract_bare_json() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here you go:\n```json\n{\"category\": \"complaint\"}\n```\nThanks";
        assert_eq!(extract_json(text), Some(r#"{"category": "complaint"}"#));

        let plain_fence = "```\n{\"x\": true}\n```";
        assert_eq!(extract_json(plain_fence), Some(r#"{"x": true}"#));
    }

    #[test]
    fn test_extract_json_in_prose() {
        let text = r#"The result is {"passed": true, "score": 0.9} as requested."#;
        assert_eq!(extract_json(text), Some(r#"{"passed": true, "score": 0.9}"#));
    }

    #[test]
    fn test_no_json() {
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }
}

//! JSON extraction utilities for parsing LLM responses that don't play by
//! the rules of pure JSON output.

use serde_json::Value;

/// Extract a JSON block from LLM response text.
///
/// Handles two common patterns:
/// 1. JSON wrapped in ```json ... ``` code blocks
/// 2. Raw JSON objects (finds first { to last })
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return Some(text[content_start..content_start + end].trim());
        }
    }

    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            return Some(&text[start..=end]);
        }
    }

    None
}

/// `structured_chat` is expected to return a bare JSON value, but some
/// providers wrap it in prose or a fenced block anyway. If `raw` is already
/// an object or array, it's returned unchanged; otherwise this falls back to
/// scraping a JSON block out of its string form.
pub fn reparse_if_needed(raw: Value) -> Value {
    if raw.is_object() || raw.is_array() {
        return raw;
    }
    if let Value::String(text) = &raw {
        if let Some(block) = extract_json_block(text) {
            if let Ok(parsed) = serde_json::from_str(block) {
                return parsed;
            }
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_code_block() {
        let text = "Here's the response:\n```json\n{\"key\": \"value\"}\n```\n";
        assert_eq!(extract_json_block(text), Some("{\"key\": \"value\"}"));
    }

    #[test]
    fn test_extract_raw_json() {
        let text = r#"Some text before {"key": "value"} and after"#;
        assert_eq!(extract_json_block(text), Some(r#"{"key": "value"}"#));
    }

    #[test]
    fn test_no_json() {
        let text = "Just plain text without any JSON";
        assert_eq!(extract_json_block(text), None);
    }

    #[test]
    fn object_input_passes_through() {
        let value = serde_json::json!({"a": 1});
        assert_eq!(reparse_if_needed(value.clone()), value);
    }
}

//! Tolerant extraction of a JSON object from free-form model output.

use serde_json::{Map, Value};

/// Parse `text` as a JSON object.
///
/// The whole string is tried first. Failing that, the first balanced
/// `{...}` block is extracted and parsed; braces inside string literals are
/// ignored when balancing. Returns `None` when no object can be recovered.
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Some(map);
    }
    let block = first_object_block(trimmed)?;
    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn first_object_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Read a string field, treating missing and non-string values as empty.
pub fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_string_object() {
        let map = parse_json_object(r#"{"due_text": "tomorrow", "due_mode": "all_day"}"#).unwrap();
        assert_eq!(str_field(&map, "due_text"), "tomorrow");
    }

    #[test]
    fn test_object_inside_prose() {
        let text = "Sure! Here you go:\n```json\n{\"a\": {\"b\": 1}, \"c\": \"}\"}\n```\nThanks";
        let map = parse_json_object(text).unwrap();
        assert_eq!(map["a"]["b"], 1);
        assert_eq!(str_field(&map, "c"), "}");
    }

    #[test]
    fn test_truncated_json_is_none() {
        assert!(parse_json_object(r#"{"reminders": ["#).is_none());
        assert!(parse_json_object("").is_none());
        assert!(parse_json_object("no json here").is_none());
    }

    #[test]
    fn test_non_object_json_rejected() {
        assert!(parse_json_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let map = parse_json_object(r#"noise {"title": "say \"hi\" {now}"} tail"#).unwrap();
        assert_eq!(str_field(&map, "title"), r#"say "hi" {now}"#);
    }

    #[test]
    fn test_str_field_missing_or_wrong_type() {
        let map = parse_json_object(r#"{"n": 3}"#).unwrap();
        assert_eq!(str_field(&map, "n"), "");
        assert_eq!(str_field(&map, "missing"), "");
    }
}

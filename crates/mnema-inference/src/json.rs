//! Lenient parsing of model JSON output.
//!
//! Models asked for JSON still wrap it in Markdown fences, emit Python
//! literals, prepend prose, or wrap the expected object in another object.
//! [`parse_json_lenient`] tries each repair in turn.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```[A-Za-z]*").expect("valid fence regex"))
}

fn python_literal_regex() -> &'static Regex {
    static LITERAL: OnceLock<Regex> = OnceLock::new();
    LITERAL.get_or_init(|| Regex::new(r"\b(True|False|None)\b").expect("valid literal regex"))
}

/// Strip Markdown code fences and replace Python `True`/`False`/`None`.
pub fn clean_response(raw: &str) -> String {
    let unfenced = fence_regex().replace_all(raw, "");
    python_literal_regex()
        .replace_all(unfenced.trim(), |caps: &regex::Captures| match &caps[1] {
            "True" => "true",
            "False" => "false",
            _ => "null",
        })
        .into_owned()
}

/// First balanced `{...}` object in `text`, skipping braces inside strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse JSON, falling back through cleanup, object extraction, and
/// unwrapping a single nested object (e.g. `{"analysis": {...}}`).
pub fn parse_json_lenient<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let direct_err = match serde_json::from_str::<T>(raw) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };

    let cleaned = clean_response(raw);
    if let Ok(v) = serde_json::from_str::<T>(&cleaned) {
        return Ok(v);
    }

    let Some(object) = extract_json_object(&cleaned) else {
        return Err(direct_err);
    };
    let value: Value = match serde_json::from_str(object) {
        Ok(v) => v,
        Err(_) => return Err(direct_err),
    };
    if let Ok(v) = serde_json::from_value::<T>(value.clone()) {
        return Ok(v);
    }
    if let Value::Object(map) = value {
        for inner in map.into_values() {
            if inner.is_object() {
                if let Ok(v) = serde_json::from_value::<T>(inner) {
                    return Ok(v);
                }
            }
        }
    }
    Err(direct_err)
}

/// String array at `key`; `None` when absent or not an array.
pub fn string_array(value: &Value, key: &str) -> Option<Vec<String>> {
    let items = value.get(key)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    )
}

/// Non-empty trimmed string at `key`.
pub fn non_empty_string(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        ok: bool,
        name: Option<String>,
    }

    #[test]
    fn test_direct_parse() {
        let s: Sample = parse_json_lenient(r#"{"ok": true, "name": "a"}"#).unwrap();
        assert_eq!(s.name.as_deref(), Some("a"));
    }

    #[test]
    fn test_fenced_python_literals() {
        let raw = "```json\n{\"ok\": True, \"name\": None}\n```";
        let s: Sample = parse_json_lenient(raw).unwrap();
        assert_eq!(s, Sample { ok: true, name: None });
    }

    #[test]
    fn test_prose_around_object() {
        let raw = "Sure! Here you go: {\"ok\": false, \"name\": \"has } brace\"} hope it helps";
        let s: Sample = parse_json_lenient(raw).unwrap();
        assert_eq!(s.name.as_deref(), Some("has } brace"));
    }

    #[test]
    fn test_wrapped_object() {
        let s: Sample = parse_json_lenient(r#"{"result": {"ok": true}}"#).unwrap();
        assert!(s.ok);
    }

    #[test]
    fn test_garbage_fails() {
        assert!(parse_json_lenient::<Sample>("not json at all").is_err());
    }

    #[test]
    fn test_literal_replacement_respects_word_boundaries() {
        assert_eq!(clean_response("{\"a\": Truely}"), "{\"a\": Truely}");
    }

    #[test]
    fn test_field_helpers() {
        let v: Value = serde_json::json!({"k": ["a", " ", 3, "b "], "c": "  ", "d": "x"});
        assert_eq!(string_array(&v, "k"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(string_array(&v, "c"), None);
        assert_eq!(non_empty_string(&v, "c"), None);
        assert_eq!(non_empty_string(&v, "d"), Some("x".to_string()));
    }
}

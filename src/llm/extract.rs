//! Text extraction from raw provider payloads.
//!
//! Providers nest answer text differently (and sometimes return only partial
//! structures), so extraction tries progressively looser strategies and never
//! fails: a direct `text` field, then every `parts[].text` reachable through
//! the usual envelope keys, then the payload rendered as a string.

use serde_json::Value as JsonValue;

/// Envelope keys searched for nested parts.
const NESTED_KEYS: &[&str] = &["candidates", "content", "contents", "message", "choices"];

/// Nesting limit for the parts search.
const MAX_DEPTH: usize = 8;

/// Extracts answer text from a provider response.
pub fn extract_text(value: &JsonValue) -> String {
    if let Some(text) = value.get("text").and_then(JsonValue::as_str) {
        if !text.is_empty() {
            return text.to_string();
        }
    }

    let mut parts = Vec::new();
    collect_parts(value, 0, &mut parts);
    let joined = parts.concat();
    if !joined.is_empty() {
        return joined;
    }

    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn collect_parts<'a>(value: &'a JsonValue, depth: usize, out: &mut Vec<&'a str>) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        JsonValue::Array(items) => {
            for item in items {
                collect_parts(item, depth + 1, out);
            }
        }
        JsonValue::Object(map) => {
            if let Some(JsonValue::Array(parts)) = map.get("parts") {
                out.extend(
                    parts
                        .iter()
                        .filter_map(|part| part.get("text").and_then(JsonValue::as_str)),
                );
            }
            for key in NESTED_KEYS {
                match map.get(*key) {
                    Some(JsonValue::String(text)) if *key == "content" => out.push(text.as_str()),
                    Some(nested) => collect_parts(nested, depth + 1, out),
                    None => {}
                }
            }
        }
        _ => {}
    }
}

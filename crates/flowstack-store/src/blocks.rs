use serde_json::{json, Map, Value};

/// Normalize caller-supplied blocks into a storable JSON object.
///
/// Frontends send either a parsed object or a stringified one; both must
/// land in the same shape. Anything that is not an object gets wrapped
/// rather than rejected.
pub fn normalize_blocks(input: Value) -> Map<String, Value> {
    match input {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => map,
            Ok(other) => wrap("value", other),
            Err(_) => wrap("raw", Value::String(s)),
        },
        Value::Array(items) => wrap("list", Value::Array(items)),
        other => wrap("raw", Value::String(other.to_string())),
    }
}

/// Parse stored blocks text back into an object. Stored text that fails to
/// parse comes back wrapped, never as an error.
pub fn parse_blocks(text: &str) -> Value {
    if text.is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(v @ Value::Object(_)) => v,
        Ok(other) => json!({ "value": other }),
        Err(_) => json!({ "raw": text }),
    }
}

fn wrap(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_passes_through() {
        let input = json!({"nodes": []});
        assert_eq!(Value::Object(normalize_blocks(input.clone())), input);
    }

    #[test]
    fn test_stringified_object_is_parsed() {
        let normalized = normalize_blocks(json!(r#"{"nodes": [1]}"#));
        assert_eq!(Value::Object(normalized), json!({"nodes": [1]}));
    }

    #[test]
    fn test_stringified_scalar_wraps_as_value() {
        let normalized = normalize_blocks(json!("42"));
        assert_eq!(Value::Object(normalized), json!({"value": 42}));
    }

    #[test]
    fn test_garbage_string_wraps_as_raw() {
        let normalized = normalize_blocks(json!("not { json"));
        assert_eq!(Value::Object(normalized), json!({"raw": "not { json"}));
    }

    #[test]
    fn test_array_wraps_as_list() {
        let normalized = normalize_blocks(json!([1, 2]));
        assert_eq!(Value::Object(normalized), json!({"list": [1, 2]}));
    }

    #[test]
    fn test_null_becomes_empty_object() {
        assert!(normalize_blocks(Value::Null).is_empty());
    }

    #[test]
    fn test_parse_round_trips_and_tolerates_corruption() {
        assert_eq!(parse_blocks(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_blocks("[1]"), json!({"value": [1]}));
        assert_eq!(parse_blocks("corrupt"), json!({"raw": "corrupt"}));
        assert_eq!(parse_blocks(""), json!({}));
    }
}

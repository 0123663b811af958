//! Helpers for the dynamic values that flow through forms
//!
//! Entity data is plain `serde_json::Value`. An entity or DTO is a JSON
//! object, aliased here as [`Record`].

use serde_json::{Map, Value};

/// A single entity or DTO: field name to value
pub type Record = Map<String, Value>;

/// JavaScript-style truthiness
///
/// `null`, `false`, `0`, `""` and `[]` are falsy. Objects are always truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Whether a value counts as "not filled in" for required checks
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Shallow merge of `overlay` onto `base`
///
/// Keys in `overlay` replace keys in `base`; nested objects are not merged.
pub fn shallow_merge(base: &Record, overlay: &Record) -> Record {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Length used by length-based rules: characters for strings, items for arrays
pub fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Short human-readable rendering used in log lines
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!([0])));
    }

    #[test]
    fn test_empty_value() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!("   ")));
        assert!(is_empty_value(&json!({})));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!("x")));
    }

    #[test]
    fn test_shallow_merge_replaces_nested_objects() {
        let base = json!({"city": "Oslo", "geo": {"lat": 1, "lng": 2}});
        let overlay = json!({"geo": {"lat": 5}});
        let merged = shallow_merge(
            base.as_object().unwrap(),
            overlay.as_object().unwrap(),
        );
        assert_eq!(Value::Object(merged), json!({"city": "Oslo", "geo": {"lat": 5}}));
    }

    #[test]
    fn test_value_len() {
        assert_eq!(value_len(&json!("héllo")), Some(5));
        assert_eq!(value_len(&json!([1, 2])), Some(2));
        assert_eq!(value_len(&json!(3)), None);
    }
}

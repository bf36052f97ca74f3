//! Tolerant handling of "one or many" JSON inputs.

use serde_json::Value;

/// `null` becomes `[]`, an array is returned as is, anything else is wrapped.
pub fn ensure_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

pub fn safe_map<R>(value: Value, f: impl FnMut(Value) -> R) -> Vec<R> {
    ensure_array(value).into_iter().map(f).collect()
}

pub fn safe_filter(value: Value, mut predicate: impl FnMut(&Value) -> bool) -> Vec<Value> {
    ensure_array(value).into_iter().filter(|v| predicate(v)).collect()
}

pub fn ensure_vec<T>(value: Option<Vec<T>>) -> Vec<T> {
    value.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ensure_array() {
        assert_eq!(ensure_array(Value::Null), Vec::<Value>::new());
        assert_eq!(ensure_array(json!("+255712345678")), vec![json!("+255712345678")]);
        assert_eq!(ensure_array(json!({ "a": 1 })), vec![json!({ "a": 1 })]);
        assert_eq!(ensure_array(json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(ensure_array(json!([])), Vec::<Value>::new());
    }

    #[test]
    fn test_safe_helpers() {
        let doubled = safe_map(json!([1, 2, 3]), |v| v.as_i64().unwrap_or(0) * 2);
        assert_eq!(doubled, vec![2, 4, 6]);
        assert_eq!(safe_map(Value::Null, |v| v).len(), 0);

        let strings = safe_filter(json!(["a", 1, "b"]), Value::is_string);
        assert_eq!(strings, vec![json!("a"), json!("b")]);

        assert_eq!(ensure_vec::<u8>(None), Vec::<u8>::new());
        assert_eq!(ensure_vec(Some(vec![1])), vec![1]);
    }
}

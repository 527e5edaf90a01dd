//! Deep merge and structural equality over JSON trees.

use serde_json::{Map, Value};

/// Merge `source` into `target` and return the result.
///
/// Object-valued keys in `source` merge recursively into the matching keys of
/// `target`. Any other value in `source` (array, string, number, bool, `null`)
/// replaces the target value wholesale. Keys present in `target` but absent
/// from `source` are kept untouched.
///
/// # Examples
///
/// ```
/// use pathstore::deep_merge;
/// use serde_json::json;
///
/// let merged = deep_merge(
///     json!({"a": {"x": 1, "y": 2}, "list": [9]}),
///     &json!({"a": {"y": 3}, "list": [1, 2]}),
/// );
/// assert_eq!(merged, json!({"a": {"x": 1, "y": 3}, "list": [1, 2]}));
/// ```
pub fn deep_merge(target: Value, source: &Value) -> Value {
    match (target, source) {
        (Value::Object(mut target), Value::Object(source)) => {
            merge_objects(&mut target, source);
            Value::Object(target)
        }
        (_, source) => source.clone(),
    }
}

fn merge_objects(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match target.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                let current = std::mem::take(existing);
                *existing = deep_merge(current, value);
            }
            Some(existing) => *existing = value.clone(),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Structural equality with explicit semantics.
///
/// - objects are equal when they hold the same key set with equal values,
///   regardless of insertion order
/// - arrays are compared element-wise, in order
/// - numbers are compared numerically, so `1` equals `1.0`
/// - `null` only equals `null`
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| deep_equal(value, other)))
        }
        _ => false,
    }
}

/// [`deep_equal`] lifted over possibly-absent values.
///
/// An absent value only equals another absent value; in particular an absent
/// key is *not* equal to an explicit `null`.
pub fn deep_equal_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => deep_equal(a, b),
        _ => false,
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

//! Canonical structural equality for JSON payloads.
//!
//! Two payloads are equal when they describe the same value, regardless of
//! the order in which object keys were inserted or how a number was written
//! (`1` and `1.0` are the same number). Arrays stay positional.
//!
//! Comparing serialized strings is not equivalent: two semantically identical
//! objects can serialize with different key order and would be reported as a
//! conflict.

use serde_json::{Map, Number, Value};

/// Recursive, key-order independent equality of two JSON values.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => objects_equal(x, y),
        _ => false,
    }
}

fn objects_equal(x: &Map<String, Value>, y: &Map<String, Value>) -> bool {
    x.len() == y.len()
        && x
            .iter()
            .all(|(key, value)| y.get(key).is_some_and(|other| values_equal(value, other)))
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    // Exact integer comparison first so large ids don't lose precision.
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

//! Wire normalization for the remote service's two schema conventions.
//!
//! The hosted backend carries two parallel schema definitions for the same
//! logical tables: a legacy snake_case one and a newer camelCase one. The
//! canonical representation in this workspace is camelCase only; every
//! payload crossing the remote boundary is passed through [`to_canonical`]
//! so the rest of the code never sees the legacy casing.

use serde_json::{Map, Value};

/// Normalize all object keys in a payload to the canonical camelCase form.
///
/// Recurses through nested objects and arrays. Keys that are already
/// camelCase are left untouched, so the function is idempotent.
pub fn to_canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                out.insert(camel_case(&key), to_canonical(inner));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(to_canonical).collect()),
        other => other,
    }
}

/// Convert a snake_case key to camelCase. Keys without underscores pass
/// through unchanged.
fn camel_case(key: &str) -> String {
    if !key.contains('_') {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

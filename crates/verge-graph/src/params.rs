//! Placeholder parameter cleaning.
//!
//! Callers frequently hand over placeholder maps sourced from path or query
//! strings, where numbers arrive as text. Integer-looking strings are
//! coerced to numbers recursively; everything else passes through. Float
//! parsing is deliberately avoided: it would coerce strings like "NaN"
//! that must stay textual.

use serde_json::Value;

use verge_core::PropertyMap;

/// Clean a caller-supplied placeholder map. `None` becomes an empty map.
pub fn clean_placeholders(placeholder: Option<&PropertyMap>) -> PropertyMap {
    placeholder.map(clean_map).unwrap_or_default()
}

fn clean_map(map: &PropertyMap) -> PropertyMap {
    map.iter()
        .map(|(key, value)| (key.clone(), clean_value(value)))
        .collect()
}

fn clean_value(value: &Value) -> Value {
    match value {
        Value::String(text) => match text.parse::<i64>() {
            Ok(number) => Value::from(number),
            Err(_) => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(clean_value).collect()),
        Value::Object(map) => Value::Object(clean_map(map)),
        _ => value.clone(),
    }
}

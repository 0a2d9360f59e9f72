//! Structural merge of a partial update into an entity snapshot.
//!
//! The merge is pure: neither input is mutated and the result is a fresh
//! deep structure. Policies are passed explicitly per call rather than
//! living in ambient defaults, so two callers can never observe each
//! other's settings.

use serde_json::Value;

use crate::types::PropertyMap;

/// What a null update value does to the matching snapshot key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DictKeyPolicy {
    /// Write an explicit null over the existing value.
    #[default]
    Upsert,
    /// Delete the key from the result.
    Remove,
}

/// How an update list combines with an existing list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListValuePolicy {
    /// Append update elements not already present (deep equality).
    #[default]
    Upsert,
    /// Delete existing elements that deep-equal an update element.
    Remove,
    /// Discard the existing list and take the update list wholesale.
    Replace,
}

/// Per-call merge policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub dict_keys: DictKeyPolicy,
    pub list_values: ListValuePolicy,
}

/// Merge a partial update map into a snapshot map.
///
/// Keys present only in `original` pass through unchanged. For each key in
/// `updates`: nulls follow the dict-key policy, lists follow the list-value
/// policy, nested maps merge recursively under the same options, and
/// everything else (scalars, type mismatches) takes the update value.
pub fn merge(original: &PropertyMap, updates: &PropertyMap, options: MergeOptions) -> PropertyMap {
    let mut result = original.clone();

    for (key, update) in updates {
        match update {
            Value::Null => match options.dict_keys {
                DictKeyPolicy::Remove => {
                    result.remove(key);
                }
                DictKeyPolicy::Upsert => {
                    result.insert(key.clone(), Value::Null);
                }
            },
            Value::Array(incoming) => {
                let value = match result.get(key) {
                    Some(Value::Array(existing)) => {
                        Value::Array(merge_lists(existing, incoming, options.list_values))
                    }
                    _ => update.clone(),
                };
                result.insert(key.clone(), value);
            }
            Value::Object(incoming) => {
                let value = match result.get(key) {
                    Some(Value::Object(existing)) => {
                        Value::Object(merge(existing, incoming, options))
                    }
                    _ => update.clone(),
                };
                result.insert(key.clone(), value);
            }
            _ => {
                result.insert(key.clone(), update.clone());
            }
        }
    }

    result
}

fn merge_lists(existing: &[Value], incoming: &[Value], policy: ListValuePolicy) -> Vec<Value> {
    match policy {
        ListValuePolicy::Replace => incoming.to_vec(),
        ListValuePolicy::Upsert => {
            let mut out = existing.to_vec();
            for value in incoming {
                if !out.contains(value) {
                    out.push(value.clone());
                }
            }
            out
        }
        ListValuePolicy::Remove => existing
            .iter()
            .filter(|value| !incoming.contains(value))
            .cloned()
            .collect(),
    }
}

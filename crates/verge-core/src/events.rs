//! Event envelope types for mutation publishing.
//!
//! Every committed mutation emits one event tagged with its operation.
//! Message attributes follow the typed string-value convention of the
//! downstream message bus.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The mutation that produced an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(()),
        }
    }
}

/// A typed message attribute attached to a published event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageAttribute {
    #[serde(rename = "DataType")]
    pub data_type: String,

    #[serde(rename = "StringValue")]
    pub string_value: String,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: value.into(),
        }
    }
}

pub type MessageAttributes = BTreeMap<String, MessageAttribute>;

/// Build the attribute set for one published event.
///
/// Adapter-level defaults come first, per-call overrides win on name
/// collisions, an `operation` attribute is always present, and null-valued
/// entries are omitted entirely.
pub fn format_attributes(
    operation: Operation,
    defaults: &BTreeMap<String, Value>,
    overrides: &BTreeMap<String, Value>,
) -> MessageAttributes {
    let mut attributes = MessageAttributes::new();
    attributes.insert(
        "operation".to_string(),
        MessageAttribute::string(operation.as_str()),
    );

    for (key, value) in defaults.iter().chain(overrides.iter()) {
        if let Some(text) = attribute_text(value) {
            attributes.insert(key.clone(), MessageAttribute::string(text));
        }
    }

    attributes
}

fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The serialized envelope a publisher sends for one mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub payload: Value,
}

impl MutationEvent {
    pub fn new(operation: Operation, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation,
            payload,
        }
    }
}

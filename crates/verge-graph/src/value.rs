//! Tagged value model for graph query results.
//!
//! Result shapes are an explicit closed set, dispatched by case match.
//! Property values are native JSON scalars by the time they reach this
//! model; wrapper types from the wire are collapsed at the Bolt boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use verge_core::PropertyMap;

/// Opaque comparable node identity assigned by the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity(pub i64);

/// A node returned from a query: identity, labels, and properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub identity: NodeIdentity,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl NodeRef {
    pub fn new(identity: i64, labels: Vec<String>, properties: PropertyMap) -> Self {
        Self {
            identity: NodeIdentity(identity),
            labels,
            properties,
        }
    }
}

/// A relationship returned from a query, referencing its endpoints by
/// identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRef {
    pub start: NodeIdentity,
    pub end: NodeIdentity,
    pub rel_type: String,
    pub properties: PropertyMap,
}

impl RelationshipRef {
    pub fn new(start: i64, end: i64, rel_type: impl Into<String>, properties: PropertyMap) -> Self {
        Self {
            start: NodeIdentity(start),
            end: NodeIdentity(end),
            rel_type: rel_type.into(),
            properties,
        }
    }
}

/// A traversal path: nodes interleaved with the relationships between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRef {
    pub nodes: Vec<NodeRef>,
    pub relationships: Vec<RelationshipRef>,
}

/// One value of a query-result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphValue {
    Scalar(Value),
    Node(NodeRef),
    Relationship(RelationshipRef),
    Path(PathRef),
    List(Vec<GraphValue>),
}

/// One ordered query-result row.
pub type Record = Vec<GraphValue>;

impl GraphValue {
    /// Collapse to plain JSON, for publishing raw write results.
    ///
    /// Nodes and relationships flatten to their property maps; paths keep
    /// their node/relationship structure.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Node(node) => Value::Object(node.properties.clone()),
            Self::Relationship(rel) => Value::Object(rel.properties.clone()),
            Self::Path(path) => {
                let nodes: Vec<Value> = path
                    .nodes
                    .iter()
                    .map(|n| Value::Object(n.properties.clone()))
                    .collect();
                let relationships: Vec<Value> = path
                    .relationships
                    .iter()
                    .map(|r| Value::Object(r.properties.clone()))
                    .collect();
                let mut map = PropertyMap::new();
                map.insert("nodes".to_string(), Value::Array(nodes));
                map.insert("relationships".to_string(), Value::Array(relationships));
                Value::Object(map)
            }
            Self::List(items) => Value::Array(items.iter().map(GraphValue::to_json).collect()),
        }
    }
}

/// Collapse a set of result rows to plain JSON.
pub fn records_to_json(records: &[Record]) -> Value {
    Value::Array(
        records
            .iter()
            .map(|record| Value::Array(record.iter().map(GraphValue::to_json).collect()))
            .collect(),
    )
}

//! Record normalization: raw query-result rows to label-keyed entity maps.
//!
//! The normalizer builds a registry of every node reachable in the input,
//! resolves relationships against that registry, nests the end node's
//! properties on the start node under the relationship-type key, and groups
//! root entities by label in first-seen order. Unresolvable relationships
//! and unrecognized value shapes are dropped, never errored.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;

use verge_core::PropertyMap;

use crate::value::{GraphValue, NodeIdentity, NodeRef, Record, RelationshipRef};

/// Label used for grouping nodes that carry no label of their own when the
/// caller does not supply one.
pub const DEFAULT_LABEL: &str = "node";

/// Options for one normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Fallback grouping label for nodes without labels.
    pub label: Option<String>,
    /// When false, records pass through untouched.
    pub serialize: bool,
    /// When true, values nested one list level deep are scanned too
    /// (fan-out results such as `collect(n)`).
    pub search: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            label: None,
            serialize: true,
            search: false,
        }
    }
}

/// Output of a normalization pass.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecords {
    /// The untouched input, for callers that opted out of serialization.
    Raw(Vec<Record>),
    /// Entity maps grouped by label, first-seen order within each label.
    Grouped(BTreeMap<String, Vec<PropertyMap>>),
}

impl NormalizedRecords {
    /// Entities grouped under the given label, empty when absent or raw.
    pub fn entities(&self, label: &str) -> &[PropertyMap] {
        match self {
            Self::Grouped(groups) => groups.get(label).map(Vec::as_slice).unwrap_or(&[]),
            Self::Raw(_) => &[],
        }
    }

    /// First entity grouped under the given label.
    pub fn first_entity(&self, label: &str) -> Option<&PropertyMap> {
        self.entities(label).first()
    }

    /// First entity of the first non-empty group, regardless of label.
    pub fn first(&self) -> Option<&PropertyMap> {
        match self {
            Self::Grouped(groups) => groups.values().find_map(|entities| entities.first()),
            Self::Raw(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Raw(records) => records.is_empty(),
            Self::Grouped(groups) => groups.values().all(Vec::is_empty),
        }
    }
}

/// Normalize raw result rows into label-keyed entity collections.
pub fn normalize(records: Vec<Record>, options: &NormalizeOptions) -> NormalizedRecords {
    if !options.serialize {
        return NormalizedRecords::Raw(records);
    }
    let default_label = options.label.as_deref().unwrap_or(DEFAULT_LABEL);

    let mut registry: HashMap<NodeIdentity, NodeRef> = HashMap::new();
    let mut order: Vec<NodeIdentity> = Vec::new();
    let mut relationships: Vec<RelationshipRef> = Vec::new();
    let mut seen: HashSet<(NodeIdentity, NodeIdentity, String)> = HashSet::new();

    for record in &records {
        for value in record {
            collect(
                value,
                options.search,
                &mut registry,
                &mut order,
                &mut relationships,
                &mut seen,
            );
        }
    }

    // Attach end-node properties under the relationship-type key. Both
    // endpoints must be in the registry; anything else is dropped.
    let mut entities: HashMap<NodeIdentity, PropertyMap> = registry
        .iter()
        .map(|(identity, node)| (*identity, node.properties.clone()))
        .collect();

    for rel in &relationships {
        let Some(end) = registry.get(&rel.end) else {
            continue;
        };
        let end_properties = end.properties.clone();
        let Some(start) = entities.get_mut(&rel.start) else {
            continue;
        };
        start.insert(rel.rel_type.clone(), Value::Object(end_properties));
    }

    let mut grouped: BTreeMap<String, Vec<PropertyMap>> = BTreeMap::new();
    for identity in order {
        let Some(node) = registry.get(&identity) else {
            continue;
        };
        let label = node
            .labels
            .first()
            .cloned()
            .unwrap_or_else(|| default_label.to_string());
        let Some(entity) = entities.remove(&identity) else {
            continue;
        };
        grouped.entry(label).or_default().push(entity);
    }

    NormalizedRecords::Grouped(grouped)
}

fn collect(
    value: &GraphValue,
    search: bool,
    registry: &mut HashMap<NodeIdentity, NodeRef>,
    order: &mut Vec<NodeIdentity>,
    relationships: &mut Vec<RelationshipRef>,
    seen: &mut HashSet<(NodeIdentity, NodeIdentity, String)>,
) {
    match value {
        GraphValue::Node(node) => register(node, registry, order),
        GraphValue::Relationship(rel) => push_relationship(rel, relationships, seen),
        GraphValue::Path(path) => {
            for node in &path.nodes {
                register(node, registry, order);
            }
            for rel in &path.relationships {
                push_relationship(rel, relationships, seen);
            }
        }
        GraphValue::List(items) if search => {
            // One extra level only: fan-out rows hold lists of plain values.
            for item in items {
                collect(item, false, registry, order, relationships, seen);
            }
        }
        _ => {}
    }
}

fn register(
    node: &NodeRef,
    registry: &mut HashMap<NodeIdentity, NodeRef>,
    order: &mut Vec<NodeIdentity>,
) {
    if !registry.contains_key(&node.identity) {
        order.push(node.identity);
        registry.insert(node.identity, node.clone());
    }
}

fn push_relationship(
    rel: &RelationshipRef,
    relationships: &mut Vec<RelationshipRef>,
    seen: &mut HashSet<(NodeIdentity, NodeIdentity, String)>,
) {
    if seen.insert((rel.start, rel.end, rel.rel_type.clone())) {
        relationships.push(rel.clone());
    }
}

//! Schema loading and recursive field projection.
//!
//! Schema documents are OpenAPI-style YAML: named schemas live under
//! `components.schemas`, and each schema is a tree of `type`, `properties`,
//! and `items`. Projection whitelists a payload against that tree: only
//! declared keys survive, at every nesting level.
//!
//! The tree is an owned structure, so a cyclic schema is unrepresentable
//! and projection depth is bounded by the document itself.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::types::PropertyMap;

/// One node of a declared schema tree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaNode {
    /// Declared type: "object", "array", or a scalar type name.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Nested field declarations for object schemas.
    #[serde(default)]
    pub properties: Option<BTreeMap<String, SchemaNode>>,

    /// Element schema for array schemas.
    #[serde(default)]
    pub items: Option<Box<SchemaNode>>,
}

impl SchemaNode {
    fn is_object(&self) -> bool {
        self.kind.as_deref() == Some("object") || self.properties.is_some()
    }

    fn is_array(&self) -> bool {
        self.kind.as_deref() == Some("array") || self.items.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    components: Components,
}

#[derive(Debug, Default, Deserialize)]
struct Components {
    #[serde(default)]
    schemas: BTreeMap<String, SchemaNode>,
}

/// Load one named schema from an OpenAPI-style YAML document.
pub fn load_schema(path: impl AsRef<Path>, name: &str) -> Result<SchemaNode> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let document: SchemaDocument =
        serde_yaml::from_str(&text).map_err(|e| SchemaError::Parse(e.to_string()))?;

    let schema = document
        .components
        .schemas
        .get(name)
        .cloned()
        .ok_or_else(|| SchemaError::NotFound {
            name: name.to_string(),
        })?;

    tracing::debug!(schema = %name, path = %path.display(), "Loaded schema");
    Ok(schema)
}

/// Whitelist a payload's fields against a schema tree.
///
/// Only keys declared in `schema.properties` survive. Object fields recurse
/// when the payload value is a map and are dropped otherwise. Array fields
/// whose item schema declares properties project each map element and drop
/// non-map elements. Scalar fields pass through untouched, with no type
/// coercion.
pub fn project(payload: &PropertyMap, schema: &SchemaNode) -> PropertyMap {
    let mut out = PropertyMap::new();
    let Some(properties) = &schema.properties else {
        return out;
    };

    for (key, field) in properties {
        let Some(value) = payload.get(key) else {
            continue;
        };

        if field.is_object() {
            if let Value::Object(nested) = value {
                out.insert(key.clone(), Value::Object(project(nested, field)));
            }
        } else if field.is_array() {
            match (value, field.items.as_deref()) {
                (Value::Array(elements), Some(items)) if items.properties.is_some() => {
                    let projected = elements
                        .iter()
                        .filter_map(|element| match element {
                            Value::Object(map) => Some(Value::Object(project(map, items))),
                            _ => None,
                        })
                        .collect();
                    out.insert(key.clone(), Value::Array(projected));
                }
                _ => {
                    out.insert(key.clone(), value.clone());
                }
            }
        } else {
            out.insert(key.clone(), value.clone());
        }
    }

    out
}

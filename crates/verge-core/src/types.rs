//! Property-map types shared across Verge components.

use serde_json::Value;

/// A flat-or-nested entity property map, as stored on a graph node.
///
/// Nested maps keyed by relationship type represent one-hop attachments
/// produced by record normalization.
pub type PropertyMap = serde_json::Map<String, Value>;

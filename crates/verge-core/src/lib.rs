//! verge-core: Shared foundation for the Verge graph data-access layer.
//!
//! This crate provides the pieces that do not touch a graph connection:
//! - Property-map types shared across all Verge components
//! - The structural merge engine for partial updates
//! - Schema loading and recursive field projection
//! - Event envelope types for mutation publishing

pub mod error;
pub mod events;
pub mod merge;
pub mod schema;
pub mod types;

pub use error::SchemaError;
pub use types::PropertyMap;

//! verge-graph: Graph access for the Verge data layer.
//!
//! This crate owns the tagged graph value model, the record normalizer
//! that turns raw query results into label-keyed entity maps, placeholder
//! parameter cleaning, and the session contract with its neo4rs-backed
//! implementation. All graph reads and writes flow through the
//! [`session::GraphSession`] seam.

pub mod client;
pub mod normalize;
pub mod params;
pub mod session;
pub mod value;

pub use client::{BoltSession, GraphConfig, GraphError};
pub use normalize::{normalize, NormalizeOptions, NormalizedRecords};
pub use session::{GraphSession, WriteOutcome};
pub use value::{GraphValue, NodeIdentity, NodeRef, PathRef, Record, RelationshipRef};

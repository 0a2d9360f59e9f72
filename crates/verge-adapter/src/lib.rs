//! verge-adapter: The mutation coordinator for the Verge graph data layer.
//!
//! This crate sequences the read-merge-project-conditional-write-publish
//! update protocol over an injected [`verge_graph::GraphSession`], and
//! exposes the thin create / read / delete / relationship / query entry
//! points around it. Committed mutations are announced through the
//! [`publish::EventPublisher`] seam, best-effort.

pub mod adapter;
pub mod config;
pub mod error;
pub mod publish;

pub use adapter::{
    CreateRequest, DeleteRequest, GraphAdapter, PublishOptions, ReadRequest, RelationshipRequest,
    UpdateRequest,
};
pub use config::AdapterConfig;
pub use error::{AdapterError, Result};
pub use publish::{EventPublisher, NoopPublisher, TracingPublisher};

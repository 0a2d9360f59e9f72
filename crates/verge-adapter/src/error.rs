//! Error types for the verge-adapter crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No entity found for label {label}")]
    NotFound { label: String },

    /// A conditional write matched nothing. Deliberately ambiguous between
    /// "entity vanished" and "idempotence value stale"; callers re-read
    /// and retry.
    #[error("Conditional write affected no rows for label {label}")]
    Conflict { label: String },

    #[error("Schema error: {0}")]
    Schema(#[from] verge_core::SchemaError),

    #[error("Graph error: {0}")]
    Graph(#[from] verge_graph::GraphError),
}

pub type Result<T> = std::result::Result<T, AdapterError>;

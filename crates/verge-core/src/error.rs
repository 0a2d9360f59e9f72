//! Error types for schema loading and projection.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed schema document: {0}")]
    Parse(String),

    #[error("Schema not found in document: {name}")]
    NotFound { name: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;

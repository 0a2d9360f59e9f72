//! The session contract: the single seam between the data layer and the
//! graph transport.
//!
//! One logical session per adapter instance; all calls are synchronous
//! request/response from the caller's perspective. Cancellation, timeouts,
//! and retry policy belong to the implementation behind this trait.

use async_trait::async_trait;

use verge_core::PropertyMap;

use crate::client::GraphError;
use crate::value::Record;

/// Result of a write: the rows the statement returned, and how many
/// entities it touched. A conditional write that matched nothing reports
/// zero affected rows.
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub records: Vec<Record>,
    pub rows_affected: usize,
}

#[async_trait]
pub trait GraphSession: Send + Sync {
    /// Execute a read statement and collect all result rows.
    async fn run_read(&self, query: &str, params: &PropertyMap) -> Result<Vec<Record>, GraphError>;

    /// Execute a write statement in auto-commit mode.
    async fn run_write(&self, query: &str, params: &PropertyMap)
        -> Result<WriteOutcome, GraphError>;

    /// Execute a single write statement inside an explicit transaction that
    /// fully commits or fully rolls back.
    async fn write_atomic(
        &self,
        query: &str,
        params: &PropertyMap,
    ) -> Result<WriteOutcome, GraphError>;
}

//! Repository trait for store backends
//!
//! SQLite, PostgreSQL and MySQL each implement `SampleRepository`; the ingest
//! pipeline only sees the trait object.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{ExtractedRow, InsertOutcome};

#[async_trait]
pub trait SampleRepository: Send + Sync {
    /// Create the destination table and its unique index if missing
    async fn ensure_schema(&self) -> Result<(), DataError>;

    /// Insert the row unless an identical `(date_time, metrics_name, value)` row exists
    async fn insert_if_absent(&self, row: &ExtractedRow) -> Result<InsertOutcome, DataError>;

    /// Number of stored rows
    async fn count_rows(&self) -> Result<u64, DataError>;
}

//! The query-engine seam the backend sits on.
//!
//! Everything above this module speaks [`QueryEngine`]; the engine decides
//! whether that means SQL over a connection pool or plain collections in
//! memory.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::DataBackendError;
use crate::schema::{Table, TableSchema};
use crate::types::BackendKind;

pub use memory::MemoryEngine;
#[cfg(feature = "postgres")]
pub use postgres::PostgresEngine;

/// Minimal tabular interface an engine has to offer the backend.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Which engine family this is.
    fn kind(&self) -> BackendKind;

    /// Dialect name, used to pick the dialect helper.
    fn dialect(&self) -> &str;

    /// Connection URL for diagnostics. Credentials are elided.
    fn url(&self) -> String;

    /// Create a table with the given schema.
    ///
    /// # Errors
    ///
    /// Returns `TableExists` when a table of that name is already there,
    /// and passes through any engine failure unchanged.
    async fn create_table(
        &self,
        name: &str,
        schema: &TableSchema,
    ) -> Result<(), DataBackendError>;

    /// Materialize a table directly from a batch of rows, inferring the
    /// schema from the first row.
    async fn create_table_from_rows(
        &self,
        name: &str,
        rows: Vec<Document>,
    ) -> Result<(), DataBackendError>;

    /// Append rows to an existing table. An empty batch is a no-op.
    async fn insert(&self, name: &str, rows: Vec<Document>) -> Result<(), DataBackendError>;

    /// Descriptor of an existing table.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` when the table does not exist.
    async fn table(&self, name: &str) -> Result<Table, DataBackendError>;

    /// Structural existence check against the engine's catalog.
    async fn table_exists(&self, name: &str) -> Result<bool, DataBackendError>;

    /// Read every row of a table, in whatever order the engine stores them.
    async fn fetch_all(&self, name: &str) -> Result<Vec<Document>, DataBackendError>;
}

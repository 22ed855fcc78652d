//! The data-backend adapter: what the surrounding framework talks to.
//!
//! [`DataBackend`] is the contract; [`SqlDataBackend`] implements it over
//! any [`QueryEngine`](crate::engine::QueryEngine).

mod sql;

pub use sql::SqlDataBackend;

use async_trait::async_trait;

use crate::artifacts::FileSystemArtifactStore;
use crate::document::Document;
use crate::error::DataBackendError;
use crate::metadata::SqlMetadataStore;
use crate::schema::{ColumnType, OutputType, Table};

/// Storage operations the framework needs from a backend.
#[async_trait]
pub trait DataBackend: Send + Sync {
    /// Logical name of this backend instance.
    fn name(&self) -> &str;

    /// Whether inserts materialize tables in memory instead of appending.
    fn in_memory(&self) -> bool;

    /// Connection URL combined with the backend name, for diagnostics.
    fn url(&self) -> String;

    /// Insert a batch of raw documents into a table, applying the
    /// dialect's value conversion and pre-insert hooks first.
    async fn insert(
        &self,
        table_name: &str,
        documents: Vec<Document>,
    ) -> Result<(), DataBackendError>;

    /// Create a table for the given column mapping, tolerating a table
    /// that already exists.
    async fn create_table_and_schema(
        &self,
        identifier: &str,
        mapping: Vec<(String, ColumnType)>,
    ) -> Result<Table, DataBackendError>;

    /// Descriptor for the table holding one model deployment's outputs.
    ///
    /// # Errors
    ///
    /// Returns `MissingDatatype` when no datatype is supplied.
    fn create_output_dest(
        &self,
        predict_id: &str,
        datatype: Option<OutputType>,
    ) -> Result<Table, DataBackendError>;

    /// Descriptor of an existing table.
    async fn get_table(&self, identifier: &str) -> Result<Table, DataBackendError>;

    /// Artifact store co-located with this backend.
    fn build_artifact_store(&self) -> FileSystemArtifactStore;

    /// Metadata store sharing this backend's engine.
    fn build_metadata(&self) -> SqlMetadataStore;

    /// Drop the backend's data.
    ///
    /// # Errors
    ///
    /// Always returns `Unimplemented`; dropping has to be done natively.
    async fn drop_data(&self, force: bool) -> Result<(), DataBackendError>;

    /// Release the backend's connection.
    async fn disconnect(&self) -> Result<(), DataBackendError>;
}

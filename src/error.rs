use thiserror::Error;

#[cfg(feature = "postgres")]
use deadpool_postgres;
#[cfg(feature = "postgres")]
use tokio_postgres;

/// Unified error type for every operation the backend exposes.
///
/// Driver and pool errors pass through transparently; everything the crate
/// itself detects is carried as a descriptive variant so callers can match
/// on the failure class instead of parsing message text.
#[derive(Debug, Error)]
pub enum DataBackendError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("An output table requires a datatype, none was supplied for '{0}'")]
    MissingDatatype(String),

    #[error("Artifact store error: {0}")]
    ArtifactError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl DataBackendError {
    /// True when the error is the structural already-exists signal raised by
    /// an engine's `create_table`.
    #[must_use]
    pub fn is_table_exists(&self) -> bool {
        matches!(self, DataBackendError::TableExists(_))
    }
}

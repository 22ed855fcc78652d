//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::artifacts::FileSystemArtifactStore;
pub use crate::backend::{DataBackend, SqlDataBackend};
pub use crate::dialect::{BASE64_PREFIX, DialectHelper, dialect_helper};
pub use crate::document::Document;
pub use crate::engine::{MemoryEngine, QueryEngine};
pub use crate::error::DataBackendError;
pub use crate::metadata::{JobStatus, SqlMetadataStore};
pub use crate::schema::{
    ColumnType, Encoder, FieldType, INPUT_KEY, OUTPUT_KEY, OutputType, Table, TableSchema, dtype,
    output_schema_name, output_table_name,
};
pub use crate::types::{BackendKind, CellValue};

#[cfg(feature = "postgres")]
pub use crate::engine::PostgresEngine;

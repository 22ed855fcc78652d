//! SQL data backend for ML pipelines.
//!
//! The central piece is [`SqlDataBackend`], which adapts a tabular query
//! engine to the storage contract a data-management framework expects:
//! row insertion with per-dialect value handling, tolerant table/schema
//! creation, output-table descriptors for model deployments, and builders
//! for the artifact and metadata stores that ride along with the data.
//!
//! Engines implement [`engine::QueryEngine`]. A `PostgreSQL` engine over
//! a deadpool connection pool ships behind the `postgres` feature, and an
//! in-process [`engine::MemoryEngine`] backs in-memory deployments and
//! tests.

pub mod artifacts;
pub mod backend;
pub mod dialect;
pub mod document;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod prelude;
pub mod schema;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod types;

pub use backend::{DataBackend, SqlDataBackend};
pub use document::Document;
pub use error::DataBackendError;
pub use types::{BackendKind, CellValue};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::artifacts::{ARTIFACT_STORE_ROOT, FileSystemArtifactStore};
use crate::backend::DataBackend;
use crate::dialect::{DialectHelper, dialect_helper};
use crate::document::Document;
use crate::engine::QueryEngine;
use crate::error::DataBackendError;
use crate::metadata::SqlMetadataStore;
use crate::schema::{
    ColumnType, INPUT_KEY, OUTPUT_KEY, OutputType, Table, TableSchema, output_schema_name,
    output_table_name,
};

/// [`DataBackend`] over a SQL query engine.
///
/// The dialect helper is picked from the engine's dialect name at
/// construction and applied around every insert and schema creation.
pub struct SqlDataBackend {
    engine: Arc<dyn QueryEngine>,
    name: String,
    in_memory: bool,
    helper: Box<dyn DialectHelper>,
}

impl SqlDataBackend {
    /// Backend in the default append mode.
    #[must_use]
    pub fn new(engine: Arc<dyn QueryEngine>, name: impl Into<String>) -> Self {
        SqlDataBackend::with_mode(engine, name, false)
    }

    /// Backend with an explicit insert mode. With `in_memory` set, inserts
    /// materialize whole tables instead of appending rows.
    #[must_use]
    pub fn with_mode(
        engine: Arc<dyn QueryEngine>,
        name: impl Into<String>,
        in_memory: bool,
    ) -> Self {
        let helper = dialect_helper(engine.dialect());
        SqlDataBackend {
            engine,
            name: name.into(),
            in_memory,
            helper,
        }
    }

    /// Connect to `PostgreSQL` and wrap the engine in a backend.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` or `ConnectionError` when the pool cannot be
    /// built from the config.
    #[cfg(feature = "postgres")]
    pub async fn connect_postgres(
        pg_config: deadpool_postgres::Config,
        name: impl Into<String>,
    ) -> Result<Self, DataBackendError> {
        let engine = Arc::new(crate::engine::PostgresEngine::connect(pg_config).await?);
        Ok(SqlDataBackend::new(engine, name))
    }

    /// The engine this backend sits on.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    /// Dialect name reported by the engine.
    #[must_use]
    pub fn dialect(&self) -> &str {
        self.engine.dialect()
    }

    /// Read a table back, undoing the dialect's value conversion on every
    /// cell.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` when the table does not exist.
    pub async fn fetch(&self, table_name: &str) -> Result<Vec<Document>, DataBackendError> {
        let rows = self.engine.fetch_all(table_name).await?;
        Ok(rows
            .into_iter()
            .map(|doc| doc.map_values(|value| self.helper.recover_value(value)))
            .collect())
    }
}

#[async_trait]
impl DataBackend for SqlDataBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_memory(&self) -> bool {
        self.in_memory
    }

    fn url(&self) -> String {
        format!("{}/{}", self.engine.url(), self.name)
    }

    async fn insert(
        &self,
        table_name: &str,
        documents: Vec<Document>,
    ) -> Result<(), DataBackendError> {
        let documents: Vec<Document> = documents
            .into_iter()
            .map(|doc| doc.map_values(|value| self.helper.convert_value(value)))
            .collect();
        let (table_name, documents) = self
            .helper
            .process_before_insert(table_name.to_string(), documents);

        if self.in_memory {
            self.engine.create_table_from_rows(&table_name, documents).await
        } else {
            self.engine.insert(&table_name, documents).await
        }
    }

    async fn create_table_and_schema(
        &self,
        identifier: &str,
        mapping: Vec<(String, ColumnType)>,
    ) -> Result<Table, DataBackendError> {
        let mapping = self.helper.process_schema_types(mapping);
        let schema = TableSchema::new(identifier, mapping)?;

        if self.engine.table_exists(identifier).await? {
            warn!("table '{}' already exists, skipping create", identifier);
            return self.engine.table(identifier).await;
        }
        match self.engine.create_table(identifier, &schema).await {
            Ok(()) => self.engine.table(identifier).await,
            Err(DataBackendError::TableExists(_)) => {
                // Lost a create race; the table is there now, use it.
                warn!("table '{}' was created concurrently, reusing it", identifier);
                self.engine.table(identifier).await
            }
            Err(e) => Err(e),
        }
    }

    fn create_output_dest(
        &self,
        predict_id: &str,
        datatype: Option<OutputType>,
    ) -> Result<Table, DataBackendError> {
        let Some(datatype) = datatype else {
            return Err(DataBackendError::MissingDatatype(predict_id.to_string()));
        };
        let fields = vec![
            (INPUT_KEY.to_string(), ColumnType::String),
            (OUTPUT_KEY.to_string(), datatype.column_type()),
        ];
        let schema = TableSchema::new(output_schema_name(predict_id), fields)?;
        Ok(Table::new(output_table_name(predict_id), schema))
    }

    async fn get_table(&self, identifier: &str) -> Result<Table, DataBackendError> {
        self.engine.table(identifier).await
    }

    fn build_artifact_store(&self) -> FileSystemArtifactStore {
        FileSystemArtifactStore::new(ARTIFACT_STORE_ROOT, "sql")
    }

    fn build_metadata(&self) -> SqlMetadataStore {
        SqlMetadataStore::new(Arc::clone(&self.engine))
    }

    async fn drop_data(&self, _force: bool) -> Result<(), DataBackendError> {
        Err(DataBackendError::Unimplemented(
            "dropping tables needs to be done in each database natively".to_string(),
        ))
    }

    async fn disconnect(&self) -> Result<(), DataBackendError> {
        // Connections live in the engine's pool and are returned on drop.
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

use crate::document::Document;
use crate::engine::QueryEngine;
use crate::error::DataBackendError;
use crate::schema::{Table, TableSchema};
use crate::types::BackendKind;

struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Document>,
}

/// In-process engine backed by plain collections.
///
/// Used for in-memory deployments and as the engine under test; it goes
/// through the same [`QueryEngine`] seam as the real engines.
pub struct MemoryEngine {
    name: String,
    dialect: String,
    tables: Mutex<HashMap<String, MemoryTable>>,
}

impl MemoryEngine {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        MemoryEngine::with_dialect(name, "memory")
    }

    /// Engine reporting a chosen dialect name, so dialect-helper behavior
    /// can be exercised without that engine being present.
    #[must_use]
    pub fn with_dialect(name: impl Into<String>, dialect: impl Into<String>) -> Self {
        MemoryEngine {
            name: name.into(),
            dialect: dialect.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryTable>> {
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of rows currently held by a table.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` when the table does not exist.
    pub fn row_count(&self, name: &str) -> Result<usize, DataBackendError> {
        self.lock()
            .get(name)
            .map(|table| table.rows.len())
            .ok_or_else(|| DataBackendError::TableNotFound(name.to_string()))
    }
}

#[async_trait]
impl QueryEngine for MemoryEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn dialect(&self) -> &str {
        &self.dialect
    }

    fn url(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn create_table(
        &self,
        name: &str,
        schema: &TableSchema,
    ) -> Result<(), DataBackendError> {
        let mut tables = self.lock();
        if tables.contains_key(name) {
            return Err(DataBackendError::TableExists(name.to_string()));
        }
        tables.insert(
            name.to_string(),
            MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn create_table_from_rows(
        &self,
        name: &str,
        rows: Vec<Document>,
    ) -> Result<(), DataBackendError> {
        let schema = TableSchema::infer(name, &rows)?;
        let mut tables = self.lock();
        if tables.contains_key(name) {
            warn!(table = name, "replacing existing in-memory table");
        }
        tables.insert(name.to_string(), MemoryTable { schema, rows });
        Ok(())
    }

    async fn insert(&self, name: &str, rows: Vec<Document>) -> Result<(), DataBackendError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tables = self.lock();
        let table = tables
            .get_mut(name)
            .ok_or_else(|| DataBackendError::TableNotFound(name.to_string()))?;
        table.rows.extend(rows);
        Ok(())
    }

    async fn table(&self, name: &str) -> Result<Table, DataBackendError> {
        self.lock()
            .get(name)
            .map(|table| Table::new(name, table.schema.clone()))
            .ok_or_else(|| DataBackendError::TableNotFound(name.to_string()))
    }

    async fn table_exists(&self, name: &str) -> Result<bool, DataBackendError> {
        Ok(self.lock().contains_key(name))
    }

    async fn fetch_all(&self, name: &str) -> Result<Vec<Document>, DataBackendError> {
        self.lock()
            .get(name)
            .map(|table| table.rows.clone())
            .ok_or_else(|| DataBackendError::TableNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use crate::types::CellValue;

    fn row(id: i64) -> Document {
        let mut doc = Document::new();
        doc.set("id", CellValue::Int(id));
        doc
    }

    #[tokio::test]
    async fn create_twice_signals_table_exists() {
        let engine = MemoryEngine::new("db");
        let schema =
            TableSchema::new("t", vec![("id".to_string(), ColumnType::Int64)]).unwrap();

        engine.create_table("t", &schema).await.unwrap();
        let err = engine.create_table("t", &schema).await.unwrap_err();
        assert!(err.is_table_exists());
    }

    #[tokio::test]
    async fn insert_into_missing_table_fails() {
        let engine = MemoryEngine::new("db");
        let err = engine.insert("nope", vec![row(1)]).await.unwrap_err();
        assert!(matches!(err, DataBackendError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn materialize_replaces_previous_rows() {
        let engine = MemoryEngine::new("db");
        engine
            .create_table_from_rows("t", vec![row(1), row(2)])
            .await
            .unwrap();
        engine
            .create_table_from_rows("t", vec![row(3)])
            .await
            .unwrap();

        assert_eq!(engine.row_count("t").unwrap(), 1);
        let rows = engine.fetch_all("t").await.unwrap();
        assert_eq!(rows[0].get("id"), Some(&CellValue::Int(3)));
    }

    #[tokio::test]
    async fn fetch_preserves_insertion_order() {
        let engine = MemoryEngine::new("db");
        engine
            .create_table_from_rows("t", vec![row(1)])
            .await
            .unwrap();
        engine.insert("t", vec![row(2), row(3)]).await.unwrap();

        let ids: Vec<i64> = engine
            .fetch_all("t")
            .await
            .unwrap()
            .iter()
            .map(|doc| *doc.get("id").and_then(CellValue::as_int).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}

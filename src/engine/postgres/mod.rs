//! `PostgreSQL` engine on deadpool connection pooling.

pub mod params;
pub mod rows;
pub mod sql;

use async_trait::async_trait;
use deadpool_postgres::{Config as PgConfig, Pool, Runtime};
use tokio_postgres::NoTls;
use tokio_postgres::error::SqlState;
use tracing::debug;

use crate::document::Document;
use crate::engine::QueryEngine;
use crate::error::DataBackendError;
use crate::schema::{Table, TableSchema};
use crate::types::{BackendKind, CellValue};

use params::Params;

/// Engine speaking to a `PostgreSQL` server through a deadpool pool.
pub struct PostgresEngine {
    pool: Pool,
    display_url: String,
}

impl PostgresEngine {
    /// Validate the config and build the connection pool.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required config fields are missing or
    /// `ConnectionError` if pool creation fails.
    #[allow(clippy::unused_async)]
    pub async fn connect(pg_config: PgConfig) -> Result<Self, DataBackendError> {
        let dbname = pg_config
            .dbname
            .clone()
            .ok_or_else(|| DataBackendError::ConfigError("dbname is required".to_string()))?;
        let host = pg_config
            .host
            .clone()
            .ok_or_else(|| DataBackendError::ConfigError("host is required".to_string()))?;
        let port = pg_config
            .port
            .ok_or_else(|| DataBackendError::ConfigError("port is required".to_string()))?;
        let user = pg_config
            .user
            .clone()
            .ok_or_else(|| DataBackendError::ConfigError("user is required".to_string()))?;
        if pg_config.password.is_none() {
            return Err(DataBackendError::ConfigError(
                "password is required".to_string(),
            ));
        }

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| {
                DataBackendError::ConnectionError(format!("Failed to create Postgres pool: {e}"))
            })?;

        Ok(PostgresEngine {
            pool,
            // Password stays out of the diagnostic URL.
            display_url: format!("postgres://{user}@{host}:{port}/{dbname}"),
        })
    }

    /// Engine over an already-built pool. The URL is only used for
    /// diagnostics.
    #[must_use]
    pub fn from_pool(pool: Pool, display_url: impl Into<String>) -> Self {
        PostgresEngine {
            pool,
            display_url: display_url.into(),
        }
    }
}

#[async_trait]
impl QueryEngine for PostgresEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn dialect(&self) -> &str {
        "postgres"
    }

    fn url(&self) -> String {
        self.display_url.clone()
    }

    async fn create_table(
        &self,
        name: &str,
        schema: &TableSchema,
    ) -> Result<(), DataBackendError> {
        let ddl = sql::create_table_sql(name, schema)?;
        let client = self.pool.get().await?;
        debug!("creating table '{}'", name);
        client
            .execute(&ddl, &[])
            .await
            .map_err(|e| classify_create_error(name, e))?;
        Ok(())
    }

    async fn create_table_from_rows(
        &self,
        name: &str,
        rows: Vec<Document>,
    ) -> Result<(), DataBackendError> {
        let schema = TableSchema::infer(name, &rows)?;
        self.create_table(name, &schema).await?;
        self.insert(name, rows).await
    }

    async fn insert(&self, name: &str, rows: Vec<Document>) -> Result<(), DataBackendError> {
        if rows.is_empty() {
            return Ok(());
        }
        let columns = column_union(&rows);
        let statement = sql::insert_sql(name, &columns, rows.len())?;
        let values = flatten_rows(&columns, &rows);
        let params = Params::convert(&values);

        let client = self.pool.get().await?;
        debug!("inserting {} rows into '{}'", rows.len(), name);
        client.execute(&statement, params.as_refs()).await?;
        Ok(())
    }

    async fn table(&self, name: &str) -> Result<Table, DataBackendError> {
        let client = self.pool.get().await?;
        let column_rows = client.query(sql::TABLE_COLUMNS_SQL, &[&name]).await?;
        if column_rows.is_empty() {
            return Err(DataBackendError::TableNotFound(name.to_string()));
        }

        let mut fields = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            let column: String = row.try_get(0)?;
            let data_type: String = row.try_get(1)?;
            fields.push((column, sql::column_type_from_pg(&data_type)));
        }
        Ok(Table::new(name, TableSchema::new(name, fields)?))
    }

    async fn table_exists(&self, name: &str) -> Result<bool, DataBackendError> {
        let client = self.pool.get().await?;
        let row = client.query_one(sql::TABLE_EXISTS_SQL, &[&name]).await?;
        Ok(row.try_get(0)?)
    }

    async fn fetch_all(&self, name: &str) -> Result<Vec<Document>, DataBackendError> {
        let statement = sql::select_all_sql(name)?;
        let client = self.pool.get().await?;
        match client.query(&statement, &[]).await {
            Ok(raw) => rows::documents_from_rows(&raw),
            Err(e) if e.code() == Some(&SqlState::UNDEFINED_TABLE) => {
                Err(DataBackendError::TableNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The server reports a duplicate `CREATE TABLE` with a dedicated SQLSTATE,
/// so the already-exists case is detected structurally rather than by
/// matching message text.
fn classify_create_error(table: &str, err: tokio_postgres::Error) -> DataBackendError {
    if err.code() == Some(&SqlState::DUPLICATE_TABLE) {
        DataBackendError::TableExists(table.to_string())
    } else {
        DataBackendError::PostgresError(err)
    }
}

/// Column names across a batch in first-seen order.
fn column_union(rows: &[Document]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for name in row.columns() {
            if !columns.iter().any(|seen| seen == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

/// Bindable values for a batch, row-major, with `Null` filling the gaps
/// where a row is missing one of the union columns.
fn flatten_rows(columns: &[String], rows: &[Document]) -> Vec<CellValue> {
    let mut values = Vec::with_capacity(columns.len() * rows.len());
    for row in rows {
        for column in columns {
            values.push(row.get(column).cloned().unwrap_or(CellValue::Null));
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_union_keeps_first_seen_order() {
        let mut a = Document::new();
        a.set("id", CellValue::Int(1));
        a.set("body", CellValue::Text("x".to_string()));
        let mut b = Document::new();
        b.set("id", CellValue::Int(2));
        b.set("extra", CellValue::Bool(true));

        assert_eq!(column_union(&[a, b]), vec!["id", "body", "extra"]);
    }

    #[test]
    fn flatten_fills_missing_cells_with_null() {
        let mut a = Document::new();
        a.set("id", CellValue::Int(1));
        let mut b = Document::new();
        b.set("other", CellValue::Int(2));

        let columns = column_union(&[a.clone(), b.clone()]);
        let values = flatten_rows(&columns, &[a, b]);
        assert_eq!(
            values,
            vec![
                CellValue::Int(1),
                CellValue::Null,
                CellValue::Null,
                CellValue::Int(2),
            ]
        );
    }
}

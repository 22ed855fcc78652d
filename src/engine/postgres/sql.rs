use std::sync::LazyLock;

use regex::Regex;

use crate::error::DataBackendError;
use crate::schema::{ColumnType, TableSchema};

/// Identifiers are spliced into DDL/DML text, so anything outside this
/// shape is rejected up front. Dots and dashes are allowed: output tables
/// are named like `_outputs.<predict-id>`.
static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$./-]*$").expect("valid identifier regex")
});

/// Catalog query backing the structural existence check.
pub const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (
    SELECT 1 FROM information_schema.tables
    WHERE table_schema = current_schema() AND table_name = $1
)";

/// Catalog query listing a table's columns in declaration order.
pub const TABLE_COLUMNS_SQL: &str = "SELECT column_name, data_type
    FROM information_schema.columns
    WHERE table_schema = current_schema() AND table_name = $1
    ORDER BY ordinal_position";

/// Validate and double-quote an identifier.
///
/// # Errors
///
/// Returns `SchemaError` when the name cannot be safely spliced.
pub fn quote_ident(name: &str) -> Result<String, DataBackendError> {
    if !IDENT_RE.is_match(name) {
        return Err(DataBackendError::SchemaError(format!(
            "'{name}' is not a usable identifier"
        )));
    }
    Ok(format!("\"{name}\""))
}

/// The DDL type name a column type maps onto.
#[must_use]
pub fn pg_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::String => "TEXT",
        ColumnType::Int32 => "INTEGER",
        ColumnType::Int64 => "BIGINT",
        ColumnType::Float32 => "REAL",
        ColumnType::Float64 => "DOUBLE PRECISION",
        ColumnType::Bool => "BOOLEAN",
        ColumnType::Bytes => "BYTEA",
        ColumnType::Json => "JSONB",
        ColumnType::Timestamp => "TIMESTAMP",
    }
}

/// Map an `information_schema` `data_type` back onto a column type.
/// Unknown types degrade to `String`, matching the extraction fallback.
#[must_use]
pub fn column_type_from_pg(data_type: &str) -> ColumnType {
    let lowered = data_type.to_ascii_lowercase();
    match lowered.as_str() {
        "smallint" | "integer" => ColumnType::Int32,
        "bigint" => ColumnType::Int64,
        "real" => ColumnType::Float32,
        "double precision" => ColumnType::Float64,
        "boolean" => ColumnType::Bool,
        "bytea" => ColumnType::Bytes,
        "json" | "jsonb" => ColumnType::Json,
        _ if lowered.starts_with("timestamp") => ColumnType::Timestamp,
        _ => ColumnType::String,
    }
}

/// Render the `CREATE TABLE` statement for a schema.
///
/// # Errors
///
/// Returns `SchemaError` when the table or a column name fails validation.
pub fn create_table_sql(table: &str, schema: &TableSchema) -> Result<String, DataBackendError> {
    let mut columns = Vec::with_capacity(schema.len());
    for (name, ty) in schema.fields() {
        columns.push(format!("{} {}", quote_ident(name)?, pg_type(*ty)));
    }
    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_ident(table)?,
        columns.join(", ")
    ))
}

/// Render a multi-row `INSERT` statement with numbered placeholders.
///
/// # Errors
///
/// Returns `SchemaError` when an identifier fails validation.
pub fn insert_sql(
    table: &str,
    columns: &[String],
    row_count: usize,
) -> Result<String, DataBackendError> {
    let quoted: Vec<String> = columns
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Result<_, _>>()?;

    let mut groups = Vec::with_capacity(row_count);
    let mut next = 1;
    for _ in 0..row_count {
        let placeholders: Vec<String> = (0..columns.len())
            .map(|offset| format!("${}", next + offset))
            .collect();
        next += columns.len();
        groups.push(format!("({})", placeholders.join(", ")));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table)?,
        quoted.join(", "),
        groups.join(", ")
    ))
}

/// Render the full-table read used by `fetch_all`.
///
/// # Errors
///
/// Returns `SchemaError` when the table name fails validation.
pub fn select_all_sql(table: &str) -> Result<String, DataBackendError> {
    Ok(format!("SELECT * FROM {}", quote_ident(table)?))
}

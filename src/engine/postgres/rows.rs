use chrono::NaiveDateTime;
use serde_json::Value;

use crate::document::Document;
use crate::error::DataBackendError;
use crate::types::CellValue;

/// Extracts a `CellValue` from a `tokio_postgres` row at the given index.
///
/// # Errors
///
/// Returns `DataBackendError` if the column cannot be retrieved.
pub fn extract_cell(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<CellValue, DataBackendError> {
    // Match on the column's type name; anything unrecognized is read back
    // as text.
    let type_info = row.columns()[idx].type_();

    if type_info.name() == "int2" {
        let val: Option<i16> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, |v| CellValue::Int(i64::from(v))))
    } else if type_info.name() == "int4" {
        let val: Option<i32> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, |v| CellValue::Int(i64::from(v))))
    } else if type_info.name() == "int8" {
        let val: Option<i64> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, CellValue::Int))
    } else if type_info.name() == "float4" {
        let val: Option<f32> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, |v| CellValue::Float(f64::from(v))))
    } else if type_info.name() == "float8" {
        let val: Option<f64> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, CellValue::Float))
    } else if type_info.name() == "bool" {
        let val: Option<bool> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, CellValue::Bool))
    } else if type_info.name() == "timestamp" || type_info.name() == "timestamptz" {
        let val: Option<NaiveDateTime> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, CellValue::Timestamp))
    } else if type_info.name() == "json" || type_info.name() == "jsonb" {
        let val: Option<Value> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, CellValue::Json))
    } else if type_info.name() == "bytea" {
        let val: Option<Vec<u8>> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, CellValue::Bytes))
    } else {
        let val: Option<String> = row.try_get(idx)?;
        Ok(val.map_or(CellValue::Null, CellValue::Text))
    }
}

/// Turn raw rows into documents keyed by column name.
///
/// # Errors
///
/// Returns `DataBackendError` if any cell cannot be extracted.
pub fn documents_from_rows(
    rows: &[tokio_postgres::Row],
) -> Result<Vec<Document>, DataBackendError> {
    let mut documents = Vec::with_capacity(rows.len());
    for row in rows {
        let mut doc = Document::new();
        for (idx, column) in row.columns().iter().enumerate() {
            doc.set(column.name(), extract_cell(row, idx)?);
        }
        documents.push(doc);
    }
    Ok(documents)
}

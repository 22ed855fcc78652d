use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::warn;

use crate::document::Document;
use crate::schema::ColumnType;
use crate::types::CellValue;

/// Marker prepended to binary values that were base64-encoded for engines
/// without a native binary type.
pub const BASE64_PREFIX: &str = "base64:";

/// Per-dialect massaging applied around inserts and schema creation.
///
/// The default methods are identity transforms; a dialect overrides only
/// the quirks it actually has.
pub trait DialectHelper: Send + Sync {
    /// Dialect name this helper matches.
    fn name(&self) -> &'static str;

    /// Rewrite one value on its way into the engine.
    fn convert_value(&self, value: CellValue) -> CellValue {
        value
    }

    /// Undo [`convert_value`](DialectHelper::convert_value) on a value read
    /// back from the engine.
    fn recover_value(&self, value: CellValue) -> CellValue {
        value
    }

    /// Last hook before a batch is handed to the engine. May rewrite the
    /// table name as well as the rows.
    fn process_before_insert(
        &self,
        table_name: String,
        rows: Vec<Document>,
    ) -> (String, Vec<Document>) {
        (table_name, rows)
    }

    /// Rewrite a schema mapping to types the dialect supports.
    fn process_schema_types(
        &self,
        fields: Vec<(String, ColumnType)>,
    ) -> Vec<(String, ColumnType)> {
        fields
    }
}

/// Identity helper used for every dialect without registered quirks.
#[derive(Debug, Default)]
pub struct BaseDialect;

impl DialectHelper for BaseDialect {
    fn name(&self) -> &'static str {
        "base"
    }
}

/// `ClickHouse` has no binary column type, so binary values travel as
/// base64 text and table names need backtick quoting.
#[derive(Debug, Default)]
pub struct ClickHouseDialect;

impl DialectHelper for ClickHouseDialect {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn convert_value(&self, value: CellValue) -> CellValue {
        match value {
            CellValue::Bytes(bytes) => {
                CellValue::Text(format!("{BASE64_PREFIX}{}", STANDARD.encode(bytes)))
            }
            other => other,
        }
    }

    fn recover_value(&self, value: CellValue) -> CellValue {
        match value {
            CellValue::Text(text) => match text.strip_prefix(BASE64_PREFIX) {
                Some(encoded) => match STANDARD.decode(encoded) {
                    Ok(bytes) => CellValue::Bytes(bytes),
                    Err(e) => {
                        warn!(error = %e, "prefixed value is not valid base64, leaving as text");
                        CellValue::Text(text)
                    }
                },
                None => CellValue::Text(text),
            },
            other => other,
        }
    }

    fn process_before_insert(
        &self,
        table_name: String,
        rows: Vec<Document>,
    ) -> (String, Vec<Document>) {
        (format!("`{table_name}`"), rows)
    }

    fn process_schema_types(
        &self,
        fields: Vec<(String, ColumnType)>,
    ) -> Vec<(String, ColumnType)> {
        fields
            .into_iter()
            .map(|(name, ty)| match ty {
                ColumnType::Bytes => (name, ColumnType::String),
                other => (name, other),
            })
            .collect()
    }
}

/// Look up the helper for a dialect name. Unmatched dialects get the
/// identity helper.
#[must_use]
pub fn dialect_helper(dialect: &str) -> Box<dyn DialectHelper> {
    match dialect {
        "clickhouse" => Box::new(ClickHouseDialect),
        _ => Box::new(BaseDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_helper_is_identity() {
        let helper = BaseDialect;
        let value = CellValue::Bytes(vec![1, 2, 3]);
        assert_eq!(helper.convert_value(value.clone()), value);

        let (table, rows) = helper.process_before_insert("t".to_string(), vec![]);
        assert_eq!(table, "t");
        assert!(rows.is_empty());
    }

    #[test]
    fn clickhouse_encodes_bytes_as_prefixed_base64() {
        let helper = ClickHouseDialect;
        let converted = helper.convert_value(CellValue::Bytes(b"hello".to_vec()));
        let CellValue::Text(text) = &converted else {
            panic!("expected text, got {converted:?}");
        };
        assert!(text.starts_with(BASE64_PREFIX));
        assert_eq!(
            helper.recover_value(converted),
            CellValue::Bytes(b"hello".to_vec())
        );
    }

    #[test]
    fn clickhouse_leaves_unprefixed_text_alone() {
        let helper = ClickHouseDialect;
        let value = CellValue::Text("plain".to_string());
        assert_eq!(helper.recover_value(value.clone()), value);
    }

    #[test]
    fn clickhouse_recover_keeps_corrupt_payload_as_text() {
        let helper = ClickHouseDialect;
        let corrupt = CellValue::Text(format!("{BASE64_PREFIX}not-base64!!"));
        assert_eq!(helper.recover_value(corrupt.clone()), corrupt);
    }

    #[test]
    fn clickhouse_quotes_table_and_downgrades_bytes_columns() {
        let helper = ClickHouseDialect;
        let (table, _) = helper.process_before_insert("docs".to_string(), vec![]);
        assert_eq!(table, "`docs`");

        let fields = helper.process_schema_types(vec![
            ("id".to_string(), ColumnType::Int64),
            ("payload".to_string(), ColumnType::Bytes),
        ]);
        assert_eq!(fields[1], ("payload".to_string(), ColumnType::String));
    }

    #[test]
    fn registry_defaults_to_base() {
        assert_eq!(dialect_helper("clickhouse").name(), "clickhouse");
        assert_eq!(dialect_helper("postgres").name(), "base");
        assert_eq!(dialect_helper("memory").name(), "base");
    }
}

use std::fmt;
use std::str::FromStr;

use crate::document::Document;
use crate::error::DataBackendError;
use crate::types::CellValue;

/// Column holding the source row id in an output table.
pub const INPUT_KEY: &str = "_input_id";
/// Column holding the computed value in an output table.
pub const OUTPUT_KEY: &str = "output";

/// Engine-neutral column types.
///
/// Each engine maps these onto its own DDL type names; see
/// `engine::postgres::sql` for the `PostgreSQL` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Bytes,
    Json,
    Timestamp,
}

impl ColumnType {
    /// Canonical tag for this type, accepted back by [`dtype`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::Float32 => "float32",
            ColumnType::Float64 => "float64",
            ColumnType::Bool => "bool",
            ColumnType::Bytes => "bytes",
            ColumnType::Json => "json",
            ColumnType::Timestamp => "timestamp",
        }
    }

    /// Infer a column type from a concrete value. `Null` falls back to
    /// `String` since nothing better can be known from one row.
    #[must_use]
    pub fn infer(value: &CellValue) -> ColumnType {
        match value {
            CellValue::Int(_) => ColumnType::Int64,
            CellValue::Float(_) => ColumnType::Float64,
            CellValue::Text(_) | CellValue::Null => ColumnType::String,
            CellValue::Bool(_) => ColumnType::Bool,
            CellValue::Timestamp(_) => ColumnType::Timestamp,
            CellValue::Json(_) => ColumnType::Json,
            CellValue::Bytes(_) => ColumnType::Bytes,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = DataBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Ok(ColumnType::String),
            "int32" | "int" => Ok(ColumnType::Int32),
            "int64" | "bigint" => Ok(ColumnType::Int64),
            "float32" | "float" => Ok(ColumnType::Float32),
            "float64" | "double" => Ok(ColumnType::Float64),
            "bool" | "boolean" => Ok(ColumnType::Bool),
            "bytes" | "binary" | "blob" => Ok(ColumnType::Bytes),
            "json" => Ok(ColumnType::Json),
            "timestamp" | "datetime" => Ok(ColumnType::Timestamp),
            other => Err(DataBackendError::SchemaError(format!(
                "unknown column type tag '{other}'"
            ))),
        }
    }
}

/// A column type resolved from a textual tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldType {
    ty: ColumnType,
}

impl FieldType {
    #[must_use]
    pub fn new(ty: ColumnType) -> Self {
        FieldType { ty }
    }

    /// The canonical tag, usable to re-resolve this field type.
    #[must_use]
    pub fn identifier(&self) -> &'static str {
        self.ty.name()
    }

    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.ty
    }
}

/// Resolve a textual type tag into a [`FieldType`].
///
/// # Errors
///
/// Returns `SchemaError` when the tag is not recognized.
pub fn dtype(tag: &str) -> Result<FieldType, DataBackendError> {
    Ok(FieldType::new(tag.parse()?))
}

/// A named datatype whose values are serialized before storage.
///
/// Encoded values land in a plain column, `Bytes` unless configured
/// otherwise, so the storage side never needs to understand the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoder {
    identifier: String,
    storage: ColumnType,
}

impl Encoder {
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Encoder {
            identifier: identifier.into(),
            storage: ColumnType::Bytes,
        }
    }

    #[must_use]
    pub fn with_storage(mut self, storage: ColumnType) -> Self {
        self.storage = storage;
        self
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn storage_type(&self) -> ColumnType {
        self.storage
    }
}

/// The datatype a model output is declared with: either a plain field
/// type or an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputType {
    Field(FieldType),
    Encoder(Encoder),
}

impl OutputType {
    /// The column type the output lands in.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        match self {
            OutputType::Field(field) => field.column_type(),
            OutputType::Encoder(encoder) => encoder.storage_type(),
        }
    }
}

impl From<FieldType> for OutputType {
    fn from(field: FieldType) -> Self {
        OutputType::Field(field)
    }
}

impl From<Encoder> for OutputType {
    fn from(encoder: Encoder) -> Self {
        OutputType::Encoder(encoder)
    }
}

/// An ordered column-name-to-type mapping with its own identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    identifier: String,
    fields: Vec<(String, ColumnType)>,
}

impl TableSchema {
    /// Build a schema from an ordered mapping.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` when the mapping is empty or names the same
    /// column twice.
    pub fn new(
        identifier: impl Into<String>,
        fields: Vec<(String, ColumnType)>,
    ) -> Result<Self, DataBackendError> {
        let identifier = identifier.into();
        if fields.is_empty() {
            return Err(DataBackendError::SchemaError(format!(
                "schema '{identifier}' has no columns"
            )));
        }
        for (i, (name, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(seen, _)| seen == name) {
                return Err(DataBackendError::SchemaError(format!(
                    "schema '{identifier}' names column '{name}' twice"
                )));
            }
        }
        Ok(TableSchema { identifier, fields })
    }

    /// Infer a schema from the first of a batch of rows.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` when the batch is empty.
    pub fn infer(
        identifier: impl Into<String>,
        rows: &[Document],
    ) -> Result<Self, DataBackendError> {
        let identifier = identifier.into();
        let Some(first) = rows.first() else {
            return Err(DataBackendError::SchemaError(format!(
                "cannot infer schema '{identifier}' from an empty batch"
            )));
        };
        let fields = first
            .iter()
            .map(|(name, value)| (name.to_string(), ColumnType::infer(value)))
            .collect();
        TableSchema::new(identifier, fields)
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, ColumnType)] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| *ty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A table descriptor: a name plus the schema the table was declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    identifier: String,
    schema: TableSchema,
}

impl Table {
    #[must_use]
    pub fn new(identifier: impl Into<String>, schema: TableSchema) -> Self {
        Table {
            identifier: identifier.into(),
            schema,
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

/// Name of the table holding the outputs of one model deployment.
#[must_use]
pub fn output_table_name(predict_id: &str) -> String {
    format!("_outputs.{predict_id}")
}

/// Name of the schema attached to one model deployment's output table.
#[must_use]
pub fn output_schema_name(predict_id: &str) -> String {
    format!("_schema/{predict_id}")
}

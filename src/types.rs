use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

/// Values that can be stored in a table cell or bound as query parameters.
///
/// The same enum is used across engines so the backend, the dialect helpers,
/// and the stores never branch on driver types:
/// ```rust
/// use sql_databackend::prelude::*;
///
/// let row = vec![
///     CellValue::Int(1),
///     CellValue::Text("alice".into()),
///     CellValue::Bool(true),
/// ];
/// # let _ = row;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Bytes(Vec<u8>),
}

impl CellValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let CellValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let CellValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let CellValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let CellValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S.%3f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let CellValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let CellValue::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let CellValue::Json(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

/// The query engines this crate can sit on top of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, ValueEnum)]
pub enum BackendKind {
    /// `PostgreSQL` engine
    #[cfg(feature = "postgres")]
    Postgres,
    /// In-process engine backed by plain collections
    Memory,
}

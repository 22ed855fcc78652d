use std::error::Error;

use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::types::CellValue;

/// Cell values borrowed as a bindable Postgres parameter list.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn convert(params: &'a [CellValue]) -> Params<'a> {
        let references: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        Params { references }
    }

    /// The parameter array in the shape the client methods take.
    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

impl ToSql for CellValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            // Narrow integers to the wire width the column expects.
            CellValue::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                _ => (*i).to_sql(ty, out),
            },
            #[allow(clippy::cast_possible_truncation)]
            CellValue::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => (*f).to_sql(ty, out),
            },
            CellValue::Text(s) => s.to_sql(ty, out),
            CellValue::Bool(b) => (*b).to_sql(ty, out),
            CellValue::Timestamp(dt) => dt.to_sql(ty, out),
            CellValue::Null => Ok(IsNull::Yes),
            CellValue::Json(jsval) => jsval.to_sql(ty, out),
            CellValue::Bytes(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        // Whitelist of column types the enum knows how to bind.
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::CHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

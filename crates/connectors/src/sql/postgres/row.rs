use crate::error::ConnectorError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use model::{
    core::value::{FieldValue, Value},
    records::row::RowData,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use tokio_postgres::{Row, types::Type};
use tracing::debug;

/// Converts a Postgres row into `RowData`, keeping projection order.
pub fn to_row_data(row: &Row) -> Result<RowData, ConnectorError> {
    let mut fields = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode(row, idx, column.type_()).map_err(|e| ConnectorError::Decode {
            column: column.name().to_string(),
            reason: e.to_string(),
        })?;
        fields.push(FieldValue::new(column.name(), value));
    }
    Ok(RowData::new(fields))
}

fn decode(row: &Row, idx: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
    let value = match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(Value::Boolean),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| Value::Int(v as i64)),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| Value::Int(v as i64)),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| Value::Int(v as i64)),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| Value::Float(v as f64)),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)?
            .and_then(|d| decimal_value(&d)),
        "date" => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| Value::Timestamp(v.and_utc())),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(Value::Timestamp),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(Value::Json),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Bytes),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)?
            .map(|v| Value::String(v.to_string())),
        "text" | "varchar" | "bpchar" | "name" | "citext" => {
            row.try_get::<_, Option<String>>(idx)?.map(Value::String)
        }
        other => match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(Value::String),
            Err(_) => {
                debug!(pg_type = other, "No decoder for Postgres type, reading as NULL");
                None
            }
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Scale-free decimals become integers when they fit, everything else a float.
fn decimal_value(d: &Decimal) -> Option<Value> {
    if d.scale() == 0
        && let Some(i) = d.to_i64()
    {
        return Some(Value::Int(i));
    }
    d.to_f64().map(Value::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn decimals_keep_integers_exact() {
        assert_eq!(
            decimal_value(&Decimal::from_str("12345678901").unwrap()),
            Some(Value::Int(12345678901))
        );
        assert_eq!(
            decimal_value(&Decimal::from_str("10.25").unwrap()),
            Some(Value::Float(10.25))
        );
    }
}

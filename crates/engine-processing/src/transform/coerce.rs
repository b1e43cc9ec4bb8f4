//! Value coercion to destination field types.

use crate::error::TransformError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use model::core::{
    field_type::{FieldType, TypeFamily},
    value::Value,
};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Converts `value` into the representation `target` indexes. Nulls pass
/// through; lossy conversions the validator warns about are performed.
pub fn coerce(field: &str, value: Value, target: &FieldType) -> Result<Value, TransformError> {
    if value.is_null() {
        return Ok(value);
    }
    let kind = value.kind();

    let coerced = match target.family() {
        TypeFamily::Integer => match value {
            Value::Json(_) | Value::Bytes(_) => None,
            Value::String(ref s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| Value::Float(s.trim().parse().ok()?).as_i64())
                .map(Value::Int),
            ref other => other.as_i64().map(Value::Int),
        },
        TypeFamily::Floating => match value {
            Value::Json(_) => None,
            ref other => other.as_f64().map(Value::Float),
        },
        TypeFamily::String => match value {
            Value::String(_) => Some(value),
            ref other => other.as_string().map(Value::String),
        },
        TypeFamily::Date => match value {
            Value::Date(_) | Value::Timestamp(_) => Some(value),
            Value::Int(millis) => DateTime::<Utc>::from_timestamp_millis(millis).map(Value::Timestamp),
            Value::String(ref s) => parse_temporal(s.trim()),
            _ => None,
        },
        TypeFamily::Boolean => match value {
            Value::Date(_) | Value::Timestamp(_) | Value::Bytes(_) => None,
            ref other => other.as_bool().map(Value::Boolean),
        },
        TypeFamily::Binary => match value {
            Value::Bytes(_) | Value::String(_) => Some(value),
            _ => None,
        },
        TypeFamily::Object => match value {
            Value::Json(_) => Some(value),
            Value::String(ref s) => serde_json::from_str(s).ok().map(Value::Json),
            _ => None,
        },
        TypeFamily::Unknown => Some(value),
    };

    coerced.ok_or_else(|| TransformError::Coercion {
        field: field.to_string(),
        kind,
        target: target.to_string(),
    })
}

fn parse_temporal(s: &str) -> Option<Value> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(Value::Timestamp(ts.with_timezone(&Utc)));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Value::Timestamp(dt.and_utc()));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Value::Date)
}

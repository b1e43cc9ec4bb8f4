//! Source column type to destination field type mapping.

use crate::core::{field_type::FieldType, source_type::SourceType};
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref TYPE_MAP: HashMap<&'static str, FieldType> = build_type_map();
}

fn build_type_map() -> HashMap<&'static str, FieldType> {
    let mut map = HashMap::new();

    // Integers
    for name in [
        "INTEGER",
        "INT",
        "SMALLINT",
        "BIGINT",
        "TINYINT",
        "MEDIUMINT",
        "INT2",
        "INT4",
        "INT8",
        "PLS_INTEGER",
        "BINARY_INTEGER",
        "SERIAL",
        "BIGSERIAL",
        "SMALLSERIAL",
    ] {
        map.insert(name, FieldType::Long);
    }

    // Floating point
    for name in ["FLOAT", "BINARY_FLOAT", "REAL", "FLOAT4"] {
        map.insert(name, FieldType::Float);
    }
    for name in ["BINARY_DOUBLE", "DOUBLE", "DOUBLE PRECISION", "FLOAT8", "MONEY"] {
        map.insert(name, FieldType::Double);
    }

    // Variable length text is analysed, fixed size text is exact-match
    for name in [
        "VARCHAR2",
        "NVARCHAR2",
        "VARCHAR",
        "CHARACTER VARYING",
        "NVARCHAR",
        "CLOB",
        "NCLOB",
        "TEXT",
        "LONG",
        "LONGTEXT",
        "MEDIUMTEXT",
        "XMLTYPE",
    ] {
        map.insert(name, FieldType::Text);
    }
    for name in ["CHAR", "NCHAR", "CHARACTER", "BPCHAR", "UUID", "ROWID", "UROWID"] {
        map.insert(name, FieldType::Keyword);
    }

    // Temporal
    for name in [
        "DATE",
        "TIMESTAMP",
        "TIMESTAMP WITH TIME ZONE",
        "TIMESTAMP WITH LOCAL TIME ZONE",
        "TIMESTAMP WITHOUT TIME ZONE",
        "TIMESTAMPTZ",
        "DATETIME",
    ] {
        map.insert(name, FieldType::Date);
    }

    // Binary
    for name in [
        "BLOB",
        "RAW",
        "LONG RAW",
        "BYTEA",
        "BINARY",
        "VARBINARY",
        "BFILE",
    ] {
        map.insert(name, FieldType::Binary);
    }

    for name in ["BOOLEAN", "BOOL"] {
        map.insert(name, FieldType::Boolean);
    }

    map
}

/// Maps a source column type to a destination field type.
///
/// Total over any input: unrecognized types fall back to `keyword`.
/// Exact numerics (`NUMBER`, `NUMERIC`, `DECIMAL`) map to `double` when they
/// carry a non-zero scale and to `long` otherwise.
/// Precision is accepted for completeness but does not influence the result.
pub fn map_type(source_type_name: &str, _precision: Option<u32>, scale: Option<i32>) -> FieldType {
    let parsed = SourceType::parse(source_type_name);
    // Explicit arguments win over anything embedded in the type name.
    let scale = scale.or(parsed.scale);

    match parsed.name.as_str() {
        "NUMBER" | "NUMERIC" | "DECIMAL" | "DEC" => match scale {
            Some(s) if s != 0 => FieldType::Double,
            _ => FieldType::Long,
        },
        name => TYPE_MAP.get(name).cloned().unwrap_or(FieldType::Keyword),
    }
}

/// Convenience wrapper over [`map_type`] for an already parsed descriptor.
pub fn map_source_type(source_type: &SourceType) -> FieldType {
    map_type(&source_type.name, source_type.precision, source_type.scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_depend_on_scale() {
        assert_eq!(map_type("NUMBER", None, None), FieldType::Long);
        assert_eq!(map_type("NUMBER(10,2)", None, None), FieldType::Double);
        assert_eq!(map_type("NUMBER", Some(10), Some(2)), FieldType::Double);
        assert_eq!(map_type("NUMBER", Some(10), Some(0)), FieldType::Long);
        assert_eq!(map_type("numeric(12)", None, None), FieldType::Long);
    }

    #[test]
    fn temporal_types_collapse_to_date() {
        for name in [
            "DATE",
            "TIMESTAMP",
            "TIMESTAMP(6) WITH TIME ZONE",
            "timestamp with local time zone",
            "timestamptz",
        ] {
            assert_eq!(map_type(name, None, None), FieldType::Date, "{name}");
        }
    }

    #[test]
    fn text_kinds_are_distinguished() {
        assert_eq!(map_type("VARCHAR2(200)", None, None), FieldType::Text);
        assert_eq!(map_type("CLOB", None, None), FieldType::Text);
        assert_eq!(map_type("CHAR(3)", None, None), FieldType::Keyword);
        assert_eq!(map_type("BLOB", None, None), FieldType::Binary);
        assert_eq!(map_type("LONG RAW", None, None), FieldType::Binary);
    }

    #[test]
    fn unknown_types_default_to_keyword() {
        for name in ["INTERVAL DAY TO SECOND", "SDO_GEOMETRY", "", "???"] {
            assert_eq!(map_type(name, None, None), FieldType::Keyword, "{name}");
        }
    }
}

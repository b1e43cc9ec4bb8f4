use model::core::{field_type::FieldType, source_type::SourceType};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod introspector;
pub mod query_shape;

/// Catalog column enriched with its inferred destination type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub source_type: SourceType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<i32>,
    pub nullable: bool,
    pub default: Option<String>,
    pub destination_type: FieldType,
}

/// Leading keyword of an analyzed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    With,
    Other,
}

/// Where a projected column most likely comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Column { table: String, column: String },
    /// Computed, ambiguous or unparseable. Carries `query.<column>`.
    Query { marker: String },
}

impl Provenance {
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Provenance::Column {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn from_query(column: &str) -> Self {
        Provenance::Query {
            marker: format!("query.{column}"),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Provenance::Column { .. })
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Column { table, column } => write!(f, "{table}.{column}"),
            Provenance::Query { marker } => f.write_str(marker),
        }
    }
}

/// A join clause found in the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinInfo {
    /// Normalized keyword, e.g. `LEFT OUTER JOIN`, or `IMPLICIT` for
    /// comma-separated FROM items.
    pub kind: String,
    pub table: String,
    pub alias: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedColumn {
    pub field: String,
    pub source_type: SourceType,
    pub destination_type: FieldType,
    pub nullable: Option<bool>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub query_type: QueryType,
    pub columns: Vec<AnalyzedColumn>,
    pub joins: Vec<JoinInfo>,
}

use chrono::{DateTime, Utc};
use model::core::source_type::SourceType;
use serde::{Deserialize, Serialize};

/// A table visible to the source connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub schema: Option<String>,
    /// Planner statistics, not an exact count. `None` if never analyzed.
    pub estimated_row_count: Option<u64>,
    pub last_analyzed: Option<DateTime<Utc>>,
}

/// Catalog metadata of one table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub source_type: SourceType,
    pub nullable: bool,
    pub default: Option<String>,
}

/// One column of a query's result shape, as reported without fetching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryColumn {
    pub name: String,
    pub source_type: SourceType,
    /// Result metadata rarely carries nullability.
    pub nullable: Option<bool>,
}

impl QueryColumn {
    pub fn new(name: impl Into<String>, source_type: impl Into<SourceType>) -> Self {
        QueryColumn {
            name: name.into(),
            source_type: source_type.into(),
            nullable: None,
        }
    }
}

use crate::{
    error::SchemaError,
    schema::{AnalyzedColumn, ColumnDescriptor, QueryAnalysis, query_shape::QueryShape},
};
use connectors::{ConnectorError, SourceQuery, metadata::TableInfo};
use model::core::type_map::map_source_type;
use std::sync::Arc;
use tracing::{debug, info};

/// Discovers source tables, columns and query shapes.
#[derive(Clone)]
pub struct SchemaIntrospector {
    source: Arc<dyn SourceQuery>,
}

impl SchemaIntrospector {
    pub fn new(source: Arc<dyn SourceQuery>) -> Self {
        SchemaIntrospector { source }
    }

    pub async fn test_connection(&self) -> Result<(), SchemaError> {
        self.source
            .test_connection()
            .await
            .map_err(SchemaError::Connection)
    }

    pub async fn list_tables(&self) -> Result<Vec<TableInfo>, SchemaError> {
        let tables = self
            .source
            .list_tables()
            .await
            .map_err(SchemaError::metadata)?;
        debug!(tables = tables.len(), "Listed source tables");
        Ok(tables)
    }

    pub async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, SchemaError> {
        let columns = self
            .source
            .list_columns(table)
            .await
            .map_err(SchemaError::metadata)?;

        Ok(columns
            .into_iter()
            .map(|col| ColumnDescriptor {
                destination_type: map_source_type(&col.source_type),
                length: col.source_type.length,
                precision: col.source_type.precision,
                scale: col.source_type.scale,
                name: col.name,
                source_type: col.source_type,
                nullable: col.nullable,
                default: col.default,
            })
            .collect())
    }

    /// Column shape of `query` from a schema-only execution, plus
    /// best-effort provenance and joins read from the query text.
    pub async fn analyze_query(&self, query: &str) -> Result<QueryAnalysis, SchemaError> {
        if query.trim().is_empty() {
            return Err(SchemaError::analysis(
                query,
                ConnectorError::Query("query is empty".to_string()),
            ));
        }

        let described = self
            .source
            .describe(query)
            .await
            .map_err(|e| SchemaError::analysis(query, e))?;

        let shape = QueryShape::parse(query);
        let columns: Vec<AnalyzedColumn> = described
            .into_iter()
            .map(|col| AnalyzedColumn {
                destination_type: map_source_type(&col.source_type),
                provenance: shape.provenance(&col.name),
                field: col.name,
                source_type: col.source_type,
                nullable: col.nullable,
            })
            .collect();

        info!(
            columns = columns.len(),
            joins = shape.joins.len(),
            resolved = columns.iter().filter(|c| c.provenance.is_resolved()).count(),
            "Analyzed query"
        );

        Ok(QueryAnalysis {
            query_type: shape.query_type,
            columns,
            joins: shape.joins,
        })
    }
}

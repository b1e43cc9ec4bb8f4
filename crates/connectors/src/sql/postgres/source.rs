use crate::{
    error::ConnectorError,
    metadata::{ColumnInfo, QueryColumn, TableInfo},
    source::SourceQuery,
    sql::postgres::{
        row::to_row_data,
        utils::{connect_client, split_table_name, with_timeout},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{core::source_type::SourceType, pagination::window::Window, records::row::RowData};
use planner::{Dialect, ExtractQuery, query::dialect::Postgres};
use std::{collections::HashMap, time::Duration};
use tokio_postgres::Client;
use tracing::debug;

const QUERY_LIST_TABLES_SQL: &str = include_str!("sql/list_tables.sql");
const QUERY_LIST_COLUMNS_SQL: &str = include_str!("sql/list_columns.sql");
const QUERY_DESCRIBE_COLUMNS_SQL: &str = include_str!("sql/describe_columns.sql");

/// PostgreSQL implementation of [`SourceQuery`].
pub struct PgSource {
    client: Client,
    dialect: Postgres,
    query_timeout: Option<Duration>,
}

impl PgSource {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let client = connect_client(url).await?;
        Ok(PgSource {
            client,
            dialect: Postgres,
            query_timeout: None,
        })
    }

    /// Deadline applied to every statement. An expired deadline surfaces
    /// as `ConnectorError::Timeout`.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Looks up declared types (`numeric(10,2)`) and nullability of result
    /// columns that come straight from a table.
    async fn declared_types(
        &self,
        keys: &[(u32, i16)],
    ) -> Result<HashMap<(u32, i16), (String, bool)>, ConnectorError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let rels: Vec<u32> = keys.iter().map(|(rel, _)| *rel).collect();
        let nums: Vec<i16> = keys.iter().map(|(_, num)| *num).collect();

        let rows = with_timeout(
            self.query_timeout,
            self.client
                .query(QUERY_DESCRIBE_COLUMNS_SQL, &[&rels, &nums]),
        )
        .await?;

        let mut declared = HashMap::with_capacity(rows.len());
        for row in rows {
            let rel: u32 = row.try_get("rel")?;
            let num: i16 = row.try_get("num")?;
            let formatted: String = row.try_get("formatted_type")?;
            let not_null: bool = row.try_get("not_null")?;
            declared.insert((rel, num), (formatted, !not_null));
        }
        Ok(declared)
    }
}

#[async_trait]
impl SourceQuery for PgSource {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn test_connection(&self) -> Result<(), ConnectorError> {
        with_timeout(self.query_timeout, self.client.simple_query("SELECT 1")).await?;
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>, ConnectorError> {
        let rows = with_timeout(
            self.query_timeout,
            self.client.query(QUERY_LIST_TABLES_SQL, &[]),
        )
        .await?;

        rows.iter()
            .map(|row| -> Result<TableInfo, ConnectorError> {
                let estimated: Option<i64> = row.try_get("estimated_rows")?;
                Ok(TableInfo {
                    name: row.try_get("table_name")?,
                    schema: row.try_get("schema_name")?,
                    // reltuples is -1 for tables that were never analyzed
                    estimated_row_count: estimated.filter(|n| *n >= 0).map(|n| n as u64),
                    last_analyzed: row.try_get::<_, Option<DateTime<Utc>>>("last_analyzed")?,
                })
            })
            .collect()
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ConnectorError> {
        let (schema, name) = split_table_name(table);
        let rows = with_timeout(
            self.query_timeout,
            self.client.query(QUERY_LIST_COLUMNS_SQL, &[&name, &schema]),
        )
        .await?;

        rows.iter()
            .map(|row| -> Result<ColumnInfo, ConnectorError> {
                let data_type: String = row.try_get("data_type")?;
                let length: Option<i32> = row.try_get("char_length")?;
                let precision: Option<i32> = row.try_get("numeric_precision")?;
                let scale: Option<i32> = row.try_get("numeric_scale")?;

                let mut source_type =
                    SourceType::new(&data_type).with_length(length.map(|l| l as u32));
                if matches!(data_type.as_str(), "numeric" | "decimal") {
                    source_type = source_type.with_precision(precision.map(|p| p as u32), scale);
                }

                Ok(ColumnInfo {
                    name: row.try_get("column_name")?,
                    source_type,
                    nullable: row.try_get("is_nullable")?,
                    default: row.try_get("column_default")?,
                })
            })
            .collect()
    }

    async fn describe(&self, query: &str) -> Result<Vec<QueryColumn>, ConnectorError> {
        // Preparing a statement returns its result shape without executing it.
        let sql = self.dialect.schema_only(query);
        let statement = with_timeout(self.query_timeout, self.client.prepare(&sql)).await?;

        let keys: Vec<(u32, i16)> = statement
            .columns()
            .iter()
            .filter_map(|c| Some((c.table_oid()?, c.column_id()?)))
            .collect();
        let declared = self.declared_types(&keys).await?;

        let columns = statement
            .columns()
            .iter()
            .map(|c| {
                let key = c.table_oid().zip(c.column_id());
                match key.and_then(|k| declared.get(&k)) {
                    Some((formatted, nullable)) => QueryColumn {
                        name: c.name().to_string(),
                        source_type: SourceType::parse(formatted),
                        nullable: Some(*nullable),
                    },
                    None => QueryColumn::new(c.name(), c.type_().name()),
                }
            })
            .collect::<Vec<_>>();

        debug!(columns = columns.len(), "Described query");
        Ok(columns)
    }

    async fn run(
        &self,
        query: &ExtractQuery,
        window: &Window,
    ) -> Result<Vec<RowData>, ConnectorError> {
        let sql = query.render_window(&self.dialect, window);
        debug!(%window, "Extracting window");
        let rows = with_timeout(self.query_timeout, self.client.query(sql.as_str(), &[])).await?;
        rows.iter().map(to_row_data).collect()
    }

    async fn count(&self, query: &ExtractQuery) -> Result<Option<u64>, ConnectorError> {
        let sql = query.render_count(&self.dialect);
        let row = with_timeout(self.query_timeout, self.client.query_one(sql.as_str(), &[])).await?;
        let count: i64 = row.try_get(0)?;
        Ok(Some(count.max(0) as u64))
    }
}

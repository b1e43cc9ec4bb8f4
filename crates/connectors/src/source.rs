use crate::{
    error::ConnectorError,
    metadata::{ColumnInfo, QueryColumn, TableInfo},
};
use async_trait::async_trait;
use model::{pagination::window::Window, records::row::RowData};
use planner::{Dialect, ExtractQuery};

/// Read access to a relational source.
#[async_trait]
pub trait SourceQuery: Send + Sync {
    /// SQL dialect used to render queries for this source.
    fn dialect(&self) -> &dyn Dialect;

    /// A cheap round trip proving the connection works.
    async fn test_connection(&self) -> Result<(), ConnectorError>;

    async fn list_tables(&self) -> Result<Vec<TableInfo>, ConnectorError>;

    /// Columns of `table`, which may be schema qualified.
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ConnectorError>;

    /// Result shape of `query`. Must not materialize any row.
    async fn describe(&self, query: &str) -> Result<Vec<QueryColumn>, ConnectorError>;

    /// Rows of one extraction window.
    async fn run(&self, query: &ExtractQuery, window: &Window)
    -> Result<Vec<RowData>, ConnectorError>;

    /// Exact row count of the query, or `None` if the source cannot tell.
    async fn count(&self, query: &ExtractQuery) -> Result<Option<u64>, ConnectorError>;
}

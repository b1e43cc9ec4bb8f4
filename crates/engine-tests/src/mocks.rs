//! In-memory connectors for driving the orchestrator without live systems.

use async_trait::async_trait;
use connectors::{
    ConnectorError, DestinationIndex, SourceQuery,
    metadata::{ColumnInfo, QueryColumn, TableInfo},
};
use engine_runtime::{ConnectorFactory, MigrationError};
use model::{
    pagination::window::Window,
    records::{document::Document, row::RowData},
};
use planner::{Dialect, ExtractQuery, query::dialect::Postgres};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

/// Pauses extraction of one window until released, so a test can act while
/// a batch is in flight.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

pub struct MockSource {
    dialect: Postgres,
    rows: Mutex<Vec<RowData>>,
    columns: Vec<QueryColumn>,
    countable: bool,
    /// One-shot failures keyed by window offset.
    failures: Mutex<HashMap<u64, ConnectorError>>,
    gates: Mutex<HashMap<u64, Gate>>,
    queries: Mutex<Vec<ExtractQuery>>,
    windows: Mutex<Vec<Window>>,
}

impl MockSource {
    pub fn new(rows: Vec<RowData>) -> Self {
        MockSource {
            dialect: Postgres,
            rows: Mutex::new(rows),
            columns: Vec::new(),
            countable: true,
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            queries: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
        }
    }

    /// Reports an unknown row count, forcing a single open window.
    pub fn uncountable(mut self) -> Self {
        self.countable = false;
        self
    }

    pub fn with_columns(mut self, columns: Vec<QueryColumn>) -> Self {
        self.columns = columns;
        self
    }

    pub fn fail_at(&self, offset: u64, err: ConnectorError) {
        self.failures.lock().unwrap().insert(offset, err);
    }

    pub fn gate_at(&self, offset: u64) -> Gate {
        let gate = Gate::default();
        self.gates.lock().unwrap().insert(offset, gate.clone());
        gate
    }

    pub fn replace_rows(&self, rows: Vec<RowData>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn queries(&self) -> Vec<ExtractQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn windows(&self) -> Vec<Window> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceQuery for MockSource {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn test_connection(&self) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>, ConnectorError> {
        Ok(vec![TableInfo {
            name: "orders".into(),
            schema: Some("public".into()),
            estimated_row_count: Some(self.rows.lock().unwrap().len() as u64),
            last_analyzed: None,
        }])
    }

    async fn list_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>, ConnectorError> {
        Ok(self
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                source_type: c.source_type.clone(),
                nullable: c.nullable.unwrap_or(true),
                default: None,
            })
            .collect())
    }

    async fn describe(&self, query: &str) -> Result<Vec<QueryColumn>, ConnectorError> {
        if !query.trim_start().to_uppercase().starts_with("SELECT")
            && !query.trim_start().to_uppercase().starts_with("WITH")
        {
            return Err(ConnectorError::Query(format!("syntax error at or near \"{query}\"")));
        }
        if !self.columns.is_empty() {
            return Ok(self.columns.clone());
        }
        // Without declared columns the shape is taken from the first row.
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .first()
            .map(|row| {
                row.field_values
                    .iter()
                    .map(|f| QueryColumn::new(f.name.clone(), "TEXT"))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn run(
        &self,
        query: &ExtractQuery,
        window: &Window,
    ) -> Result<Vec<RowData>, ConnectorError> {
        self.queries.lock().unwrap().push(query.clone());
        self.windows.lock().unwrap().push(*window);

        let gate = self.gates.lock().unwrap().remove(&window.offset);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if let Some(err) = self.failures.lock().unwrap().remove(&window.offset) {
            return Err(err);
        }

        let rows = self.rows.lock().unwrap();
        let start = (window.offset as usize).min(rows.len());
        let end = window
            .end()
            .map_or(rows.len(), |end| (end as usize).min(rows.len()));
        Ok(rows[start..end].to_vec())
    }

    async fn count(&self, _query: &ExtractQuery) -> Result<Option<u64>, ConnectorError> {
        Ok(self
            .countable
            .then(|| self.rows.lock().unwrap().len() as u64))
    }
}

/// Destination that keeps indexed documents in memory. Documents with an id
/// overwrite earlier ones, like a real index.
#[derive(Default)]
pub struct MockIndex {
    by_id: Mutex<BTreeMap<String, Document>>,
    anonymous: Mutex<Vec<Document>>,
    calls: AtomicUsize,
    /// One-shot failures keyed by bulk call number, counted from 0.
    failures: Mutex<HashMap<usize, ConnectorError>>,
    unreachable: bool,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        MockIndex {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn fail_call(&self, call: usize, err: ConnectorError) {
        self.failures.lock().unwrap().insert(call, err);
    }

    pub fn bulk_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.by_id.lock().unwrap().values().cloned().collect();
        docs.extend(self.anonymous.lock().unwrap().iter().cloned());
        docs
    }

    pub fn len(&self) -> usize {
        self.by_id.lock().unwrap().len() + self.anonymous.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DestinationIndex for MockIndex {
    async fn ping(&self) -> Result<(), ConnectorError> {
        if self.unreachable {
            return Err(ConnectorError::Connection("connection refused".into()));
        }
        Ok(())
    }

    async fn bulk_index(&self, _index: &str, documents: &[Document]) -> Result<usize, ConnectorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().remove(&call) {
            return Err(err);
        }

        let mut by_id = self.by_id.lock().unwrap();
        let mut anonymous = self.anonymous.lock().unwrap();
        for doc in documents {
            match &doc.id {
                Some(id) => {
                    by_id.insert(id.clone(), doc.clone());
                }
                None => anonymous.push(doc.clone()),
            }
        }
        Ok(documents.len())
    }
}

/// Hands every job the same mock connectors.
pub struct MockFactory {
    source: Arc<MockSource>,
    index: Arc<MockIndex>,
    pub source_opens: AtomicUsize,
    pub destination_opens: AtomicUsize,
}

impl MockFactory {
    pub fn new(source: Arc<MockSource>, index: Arc<MockIndex>) -> Self {
        MockFactory {
            source,
            index,
            source_opens: AtomicUsize::new(0),
            destination_opens: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ConnectorFactory for MockFactory {
    async fn source(&self, _connection: &str) -> Result<Arc<dyn SourceQuery>, MigrationError> {
        self.source_opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.source.clone())
    }

    async fn destination(
        &self,
        _connection: &str,
    ) -> Result<Arc<dyn DestinationIndex>, MigrationError> {
        self.destination_opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.index.clone())
    }
}

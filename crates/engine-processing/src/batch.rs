use crate::{error::BatchError, transform::pipeline::TransformPipeline};
use connectors::{ConnectorError, DestinationIndex, SourceQuery};
use model::{
    core::value::Value,
    pagination::{
        watermark::{Watermark, WatermarkBound},
        window::Window,
    },
    records::row::RowData,
};
use planner::ExtractQuery;
use std::sync::Arc;
use tracing::debug;

/// What a successfully loaded batch contributed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub rows: u64,
    pub bytes: u64,
    /// Highest watermark among the loaded rows of an incremental job.
    pub max_watermark: Option<Watermark>,
}

impl BatchOutcome {
    fn merge(&mut self, other: BatchOutcome) {
        self.rows += other.rows;
        self.bytes += other.bytes;
        self.max_watermark = Watermark::max(self.max_watermark.take(), other.max_watermark);
    }
}

/// Runs extract, transform and load for one window of a job.
pub struct BatchExecutor {
    source: Arc<dyn SourceQuery>,
    destination: Arc<dyn DestinationIndex>,
    pipeline: TransformPipeline,
    query: ExtractQuery,
    index: String,
    watermark: Option<WatermarkBound>,
    page_size: u64,
}

impl BatchExecutor {
    pub fn new(
        source: Arc<dyn SourceQuery>,
        destination: Arc<dyn DestinationIndex>,
        pipeline: TransformPipeline,
        query: ExtractQuery,
        index: impl Into<String>,
        page_size: u64,
    ) -> Self {
        BatchExecutor {
            source,
            destination,
            pipeline,
            query,
            index: index.into(),
            watermark: None,
            page_size: page_size.max(1),
        }
    }

    pub fn with_watermark(mut self, watermark: Option<WatermarkBound>) -> Self {
        self.watermark = watermark;
        self
    }

    /// A bounded window is one extraction. An open window is read in pages
    /// of `page_size` until a page comes back short; an empty first page
    /// means there was nothing to load.
    pub async fn run(&self, window: &Window) -> Result<BatchOutcome, BatchError> {
        if !window.is_open() {
            return self.run_page(window, 0).await;
        }

        let mut outcome = BatchOutcome::default();
        let mut offset = window.offset;
        loop {
            let page = Window::bounded(offset, self.page_size);
            let loaded = self.run_page(&page, outcome.rows).await?;
            let rows = loaded.rows;
            outcome.merge(loaded);
            if rows < self.page_size {
                break;
            }
            offset += rows;
        }
        Ok(outcome)
    }

    /// `carried` rows were loaded by earlier pages of the same window and
    /// count as attempted if this page fails.
    async fn run_page(&self, window: &Window, carried: u64) -> Result<BatchOutcome, BatchError> {
        let rows = self
            .source
            .run(&self.query, window)
            .await
            .map_err(|e| classify(e, |source| BatchError::Extraction {
                attempted: carried + window.limit.unwrap_or(0),
                source,
            }))?;
        if rows.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let attempted = carried + rows.len() as u64;
        let docs = self
            .pipeline
            .apply_all(&rows)
            .map_err(|source| BatchError::Transform { attempted, source })?;

        self.destination
            .bulk_index(&self.index, &docs)
            .await
            .map_err(|e| classify(e, |source| BatchError::Load { attempted, source }))?;

        debug!(%window, rows = rows.len(), "Loaded window");
        Ok(BatchOutcome {
            rows: rows.len() as u64,
            bytes: rows
                .iter()
                .flat_map(|r| r.field_values.iter())
                .map(|fv| fv.value.size_bytes() as u64)
                .sum(),
            max_watermark: self.max_watermark(&rows),
        })
    }

    fn max_watermark(&self, rows: &[RowData]) -> Option<Watermark> {
        let bound = self.watermark.as_ref()?;
        rows.iter()
            .filter_map(|row| {
                let value = row.get_value(&bound.column);
                if value.is_null() {
                    return None;
                }
                Some(Watermark {
                    value,
                    key: bound
                        .tiebreaker
                        .as_deref()
                        .map(|key| row.get_value(key))
                        .filter(|key| !matches!(key, Value::Null)),
                })
            })
            .fold(None, |max, mark| Watermark::max(max, Some(mark)))
    }
}

fn classify<F>(err: ConnectorError, batch_scoped: F) -> BatchError
where
    F: FnOnce(ConnectorError) -> BatchError,
{
    if err.is_connection() {
        BatchError::Connection(err)
    } else {
        batch_scoped(err)
    }
}

use crate::{
    error::PlanningError,
    query::{dialect::Dialect, extract::ExtractQuery},
};
use model::pagination::{watermark::WatermarkBound, window::Window};
use tracing::debug;

/// Splits a source query into fixed-size extraction windows.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    batch_size: u64,
}

impl BatchPlanner {
    pub fn new(batch_size: u64) -> Result<Self, PlanningError> {
        if batch_size == 0 {
            return Err(PlanningError::InvalidBatchSize(batch_size));
        }
        Ok(BatchPlanner { batch_size })
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// The effective query a job extracts from. Incremental jobs get the
    /// watermark predicate; it is never dropped. `order_key` is appended to
    /// the ordering so rows sharing a watermark value keep a fixed order.
    pub fn extract_query(
        &self,
        dialect: &dyn Dialect,
        base: &str,
        watermark: Option<&WatermarkBound>,
        order_key: Option<&str>,
    ) -> Result<ExtractQuery, PlanningError> {
        let query = match watermark {
            Some(bound) => ExtractQuery::incremental(base, bound, dialect)?,
            None => ExtractQuery::new(base)?,
        };
        Ok(match order_key {
            Some(key) => query.ordered_by_key(key, dialect),
            None => query,
        })
    }

    /// Windows covering `[0, total)` in order, `ceil(total / batch_size)` of
    /// them. An unknown total yields one open-ended window; completion is
    /// then detected by an empty extraction.
    pub fn windows(&self, total: Option<u64>) -> Vec<Window> {
        let Some(total) = total else {
            debug!("Row count unknown, planning a single open window");
            return vec![Window::open(0)];
        };

        let mut windows = Vec::with_capacity(total.div_ceil(self.batch_size) as usize);
        let mut offset = 0;
        while offset < total {
            let limit = self.batch_size.min(total - offset);
            windows.push(Window::bounded(offset, limit));
            offset += limit;
        }

        debug!(total, batch_size = self.batch_size, windows = windows.len(), "Planned windows");
        windows
    }
}

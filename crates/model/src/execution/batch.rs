use crate::{
    core::identifiers::{BatchId, JobId},
    pagination::{watermark::Watermark, window::Window},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extraction window of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationBatch {
    pub id: BatchId,
    pub job_id: JobId,
    /// Planning order. Never renumbered.
    pub seq: u32,
    pub offset: u64,
    pub limit: Option<u64>,
    pub status: BatchStatus,
    pub processed_records: u64,
    pub error_message: Option<String>,
    /// Highest watermark among the rows this batch loaded.
    pub max_watermark: Option<Watermark>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationBatch {
    pub fn new(job_id: JobId, seq: u32, window: Window) -> Self {
        MigrationBatch {
            id: BatchId::new(),
            job_id,
            seq,
            offset: window.offset,
            limit: window.limit,
            status: BatchStatus::Pending,
            processed_records: 0,
            error_message: None,
            max_watermark: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn window(&self) -> Window {
        Window {
            offset: self.offset,
            limit: self.limit,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }

    /// Returns a non-completed batch to `pending` for a job-level retry.
    /// Completed batches are left untouched.
    pub fn reset(&mut self) {
        if self.is_completed() {
            return;
        }
        self.status = BatchStatus::Pending;
        self.processed_records = 0;
        self.error_message = None;
        self.max_watermark = None;
        self.started_at = None;
        self.completed_at = None;
    }
}

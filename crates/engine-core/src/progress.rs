use chrono::{DateTime, Utc};
use model::{
    core::identifiers::JobId,
    execution::{
        batch::{BatchStatus, MigrationBatch},
        job::{JobStatus, MigrationJob},
    },
};
use serde::Serialize;
use std::fmt;

/// Coarse phase of a job as seen from its persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressStage {
    Queued,
    Planning,
    Loading,
    Done,
    Failed,
    Stopped,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Queued => "Queued",
            ProgressStage::Planning => "Planning",
            ProgressStage::Loading => "Loading",
            ProgressStage::Done => "Done",
            ProgressStage::Failed => "Failed",
            ProgressStage::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: JobStatus,
    pub stage: ProgressStage,
    pub total_records: Option<u64>,
    pub processed_records: u64,
    pub failed_records: u64,
    pub percentage: f64,
    pub batches_total: usize,
    pub batches_completed: usize,
    pub batches_failed: usize,
    pub batches_pending: usize,
    /// Sequence number of the batch currently being loaded.
    pub current_batch: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_secs: Option<i64>,
    pub error_message: Option<String>,
}

/// Derives a progress view from a job and its batches.
pub fn summarize(job: &MigrationJob, batches: &[MigrationBatch]) -> JobProgress {
    let count = |status: BatchStatus| batches.iter().filter(|b| b.status == status).count();
    let current_batch = batches
        .iter()
        .find(|b| b.status == BatchStatus::Running)
        .map(|b| b.seq);

    let stage = match job.status {
        JobStatus::Pending => ProgressStage::Queued,
        JobStatus::Running if batches.is_empty() => ProgressStage::Planning,
        JobStatus::Running => ProgressStage::Loading,
        JobStatus::Completed => ProgressStage::Done,
        JobStatus::Failed => ProgressStage::Failed,
        JobStatus::Stopped => ProgressStage::Stopped,
    };

    JobProgress {
        job_id: job.id,
        status: job.status,
        stage,
        total_records: job.total_records,
        processed_records: job.processed_records,
        failed_records: job.failed_records,
        percentage: job.progress_percentage(),
        batches_total: batches.len(),
        batches_completed: count(BatchStatus::Completed),
        batches_failed: count(BatchStatus::Failed),
        batches_pending: count(BatchStatus::Pending),
        current_batch,
        started_at: job.started_at,
        elapsed_secs: job.duration().map(|d| d.num_seconds()),
        error_message: job.error_message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{JobRepository, memory::MemoryStore};
    use model::{
        execution::configuration::MappingConfiguration, pagination::window::Window,
    };

    #[tokio::test]
    async fn reports_batch_breakdown() {
        let store = MemoryStore::new();
        let cfg = MappingConfiguration::new("c", "pg", "es", "SELECT 1", "idx");
        let mut job = MigrationJob::new(&cfg, false);
        job.status = JobStatus::Running;
        job.total_records = Some(30);
        job.processed_records = 10;
        store.create_job(&job).await.unwrap();

        let mut batches = store
            .create_batches(
                &job.id,
                &[
                    Window::bounded(0, 10),
                    Window::bounded(10, 10),
                    Window::bounded(20, 10),
                ],
            )
            .await
            .unwrap();
        batches[0].status = BatchStatus::Completed;
        batches[1].status = BatchStatus::Running;
        store.save_batch(&batches[0]).await.unwrap();
        store.save_batch(&batches[1]).await.unwrap();

        let batches = store.list_batches(&job.id).await.unwrap();
        let progress = summarize(&job, &batches);
        assert_eq!(progress.stage, ProgressStage::Loading);
        assert_eq!(progress.batches_completed, 1);
        assert_eq!(progress.batches_pending, 1);
        assert_eq!(progress.current_batch, Some(1));
        assert!((progress.percentage - 33.333).abs() < 0.01);
    }
}

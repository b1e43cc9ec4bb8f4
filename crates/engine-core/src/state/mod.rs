use crate::error::StateStoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    core::identifiers::{ConfigId, JobId},
    execution::{batch::MigrationBatch, configuration::MappingConfiguration, job::MigrationJob},
    pagination::{watermark::Watermark, window::Window},
};

pub mod memory;
pub mod sled_store;

/// Persisted mapping configurations.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn get_config(
        &self,
        id: &ConfigId,
    ) -> Result<Option<MappingConfiguration>, StateStoreError>;

    async fn list_configs(&self) -> Result<Vec<MappingConfiguration>, StateStoreError>;

    async fn save_config(&self, config: &MappingConfiguration) -> Result<(), StateStoreError>;

    async fn list_active(&self) -> Result<Vec<MappingConfiguration>, StateStoreError> {
        let configs = self.list_configs().await?;
        Ok(configs.into_iter().filter(|c| c.is_active).collect())
    }

    /// Records the incremental position reached by a successful run. The
    /// stored watermark only moves forward.
    async fn save_watermark(
        &self,
        id: &ConfigId,
        watermark: Option<Watermark>,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StateStoreError> {
        let mut config = self
            .get_config(id)
            .await?
            .ok_or_else(|| StateStoreError::NotFound(format!("configuration {id}")))?;
        config.last_watermark = Watermark::max(config.last_watermark.take(), watermark);
        config.last_sync_time = Some(synced_at);
        config.touch();
        self.save_config(&config).await
    }
}

/// Persisted jobs and their batches.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Inserts a new job. Fails if a job with the same id exists.
    async fn create_job(&self, job: &MigrationJob) -> Result<(), StateStoreError>;

    async fn save_job(&self, job: &MigrationJob) -> Result<(), StateStoreError>;

    async fn get_job(&self, id: &JobId) -> Result<Option<MigrationJob>, StateStoreError>;

    /// All jobs, newest first.
    async fn list_jobs(&self) -> Result<Vec<MigrationJob>, StateStoreError>;

    /// Creates one pending batch per window, numbered in window order.
    /// Fails if the job already has batches.
    async fn create_batches(
        &self,
        job_id: &JobId,
        windows: &[Window],
    ) -> Result<Vec<MigrationBatch>, StateStoreError>;

    async fn save_batch(&self, batch: &MigrationBatch) -> Result<(), StateStoreError>;

    /// Batches of a job ordered by sequence number.
    async fn list_batches(&self, job_id: &JobId) -> Result<Vec<MigrationBatch>, StateStoreError>;

    /// Removes every `completed` job together with its batches and returns
    /// how many jobs were removed.
    async fn delete_completed_jobs(&self) -> Result<usize, StateStoreError>;
}

/// Everything the engine persists.
pub trait StateStore: ConfigRepository + JobRepository {}

impl<T: ConfigRepository + JobRepository> StateStore for T {}

pub(crate) fn plan_batches(job_id: &JobId, windows: &[Window]) -> Vec<MigrationBatch> {
    windows
        .iter()
        .enumerate()
        .map(|(seq, window)| MigrationBatch::new(*job_id, seq as u32, *window))
        .collect()
}

pub(crate) fn sort_newest_first(jobs: &mut [MigrationJob]) {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

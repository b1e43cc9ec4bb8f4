use crate::{
    error::StateStoreError,
    state::{ConfigRepository, JobRepository, plan_batches, sort_newest_first},
};
use async_trait::async_trait;
use model::{
    core::identifiers::{ConfigId, JobId},
    execution::{
        batch::MigrationBatch,
        configuration::MappingConfiguration,
        job::{JobStatus, MigrationJob},
    },
    pagination::window::Window,
};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use tracing::debug;

const CONFIGS_TREE: &str = "configs";
const JOBS_TREE: &str = "jobs";
const BATCHES_TREE: &str = "batches";

/// Durable repository backed by an embedded sled database.
pub struct SledStateStore {
    db: sled::Db,
    configs: sled::Tree,
    jobs: sled::Tree,
    batches: sled::Tree,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let db = sled::open(path.as_ref()).map_err(|e| StateStoreError::Load(e.to_string()))?;
        let configs = db.open_tree(CONFIGS_TREE)?;
        let jobs = db.open_tree(JOBS_TREE)?;
        let batches = db.open_tree(BATCHES_TREE)?;
        debug!(path = %path.as_ref().display(), "Opened state store");
        Ok(Self {
            db,
            configs,
            jobs,
            batches,
        })
    }

    /// Flushes dirty pages to disk.
    pub async fn flush(&self) -> Result<(), StateStoreError> {
        self.db.flush_async().await?;
        Ok(())
    }

    /// Batch keys sort by job, then by zero-padded sequence number.
    #[inline]
    fn batch_key(job_id: &JobId, seq: u32) -> String {
        format!("{job_id}:{seq:010}")
    }

    #[inline]
    fn batch_prefix(job_id: &JobId) -> String {
        format!("{job_id}:")
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StateStoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StateStoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn load<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> Result<Option<T>, StateStoreError> {
        match tree
            .get(key)
            .map_err(|e| StateStoreError::Load(e.to_string()))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(
        tree: &sled::Tree,
        prefix: &str,
    ) -> Result<Vec<T>, StateStoreError> {
        tree.scan_prefix(prefix)
            .map(|item| {
                let (_key, value) = item.map_err(|e| StateStoreError::Load(e.to_string()))?;
                Self::decode(&value)
            })
            .collect()
    }
}

#[async_trait]
impl ConfigRepository for SledStateStore {
    async fn get_config(
        &self,
        id: &ConfigId,
    ) -> Result<Option<MappingConfiguration>, StateStoreError> {
        Self::load(&self.configs, id.as_str())
    }

    async fn list_configs(&self) -> Result<Vec<MappingConfiguration>, StateStoreError> {
        let mut configs: Vec<MappingConfiguration> = Self::scan(&self.configs, "")?;
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    async fn save_config(&self, config: &MappingConfiguration) -> Result<(), StateStoreError> {
        self.configs
            .insert(config.id.as_str(), Self::encode(config)?)?;
        Ok(())
    }
}

#[async_trait]
impl JobRepository for SledStateStore {
    async fn create_job(&self, job: &MigrationJob) -> Result<(), StateStoreError> {
        let key = job.id.to_string();
        let swapped = self
            .jobs
            .compare_and_swap(key.as_str(), None as Option<&[u8]>, Some(Self::encode(job)?))?;
        if swapped.is_err() {
            return Err(StateStoreError::Save(format!("job {} already exists", job.id)));
        }
        Ok(())
    }

    async fn save_job(&self, job: &MigrationJob) -> Result<(), StateStoreError> {
        let key = job.id.to_string();
        if !self.jobs.contains_key(key.as_str())? {
            return Err(StateStoreError::NotFound(format!("job {}", job.id)));
        }
        self.jobs.insert(key.as_str(), Self::encode(job)?)?;
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<MigrationJob>, StateStoreError> {
        Self::load(&self.jobs, &id.to_string())
    }

    async fn list_jobs(&self) -> Result<Vec<MigrationJob>, StateStoreError> {
        let mut jobs: Vec<MigrationJob> = Self::scan(&self.jobs, "")?;
        sort_newest_first(&mut jobs);
        Ok(jobs)
    }

    async fn create_batches(
        &self,
        job_id: &JobId,
        windows: &[Window],
    ) -> Result<Vec<MigrationBatch>, StateStoreError> {
        if !self.jobs.contains_key(job_id.to_string().as_str())? {
            return Err(StateStoreError::NotFound(format!("job {job_id}")));
        }
        if self
            .batches
            .scan_prefix(Self::batch_prefix(job_id))
            .next()
            .is_some()
        {
            return Err(StateStoreError::Save(format!(
                "job {job_id} already has batches"
            )));
        }

        let batches = plan_batches(job_id, windows);
        let mut write = sled::Batch::default();
        for batch in &batches {
            write.insert(
                Self::batch_key(job_id, batch.seq).as_str(),
                Self::encode(batch)?,
            );
        }
        self.batches.apply_batch(write)?;
        Ok(batches)
    }

    async fn save_batch(&self, batch: &MigrationBatch) -> Result<(), StateStoreError> {
        let key = Self::batch_key(&batch.job_id, batch.seq);
        if !self.batches.contains_key(key.as_str())? {
            return Err(StateStoreError::NotFound(format!("batch {}", batch.id)));
        }
        self.batches.insert(key.as_str(), Self::encode(batch)?)?;
        Ok(())
    }

    async fn list_batches(&self, job_id: &JobId) -> Result<Vec<MigrationBatch>, StateStoreError> {
        Self::scan(&self.batches, &Self::batch_prefix(job_id))
    }

    async fn delete_completed_jobs(&self) -> Result<usize, StateStoreError> {
        let jobs: Vec<MigrationJob> = Self::scan(&self.jobs, "")?;
        let mut removed = 0;
        for job in jobs.iter().filter(|j| j.status == JobStatus::Completed) {
            let mut write = sled::Batch::default();
            for item in self.batches.scan_prefix(Self::batch_prefix(&job.id)) {
                let (key, _) = item.map_err(|e| StateStoreError::Load(e.to_string()))?;
                write.remove(key);
            }
            self.batches.apply_batch(write)?;
            self.jobs.remove(job.id.to_string().as_str())?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::execution::batch::BatchStatus;
    use tempfile::tempdir;

    fn config() -> MappingConfiguration {
        MappingConfiguration::new("emp", "pg", "es", "SELECT * FROM emp", "emp")
    }

    #[tokio::test]
    async fn persists_jobs_and_batches_across_reopen() {
        let dir = tempdir().unwrap();
        let job = MigrationJob::new(&config(), false);

        {
            let store = SledStateStore::open(dir.path()).unwrap();
            store.create_job(&job).await.unwrap();
            let mut batches = store
                .create_batches(&job.id, &[Window::bounded(0, 10), Window::bounded(10, 10)])
                .await
                .unwrap();
            batches[1].status = BatchStatus::Failed;
            batches[1].error_message = Some("load failed".into());
            store.save_batch(&batches[1]).await.unwrap();
            store.flush().await.unwrap();
        }

        let store = SledStateStore::open(dir.path()).unwrap();
        let loaded = store.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded, job);

        let batches = store.list_batches(&job.id).await.unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].seq, 0);
        assert_eq!(batches[1].status, BatchStatus::Failed);
    }

    #[tokio::test]
    async fn rejects_duplicate_job_ids() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();
        let job = MigrationJob::new(&config(), false);

        store.create_job(&job).await.unwrap();
        assert!(matches!(
            store.create_job(&job).await,
            Err(StateStoreError::Save(_))
        ));
    }

    #[tokio::test]
    async fn lists_jobs_newest_first_and_clears_completed() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        let mut older = MigrationJob::new(&config(), false);
        older.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
        older.status = JobStatus::Completed;
        let newer = MigrationJob::new(&config(), false);

        store.create_job(&older).await.unwrap();
        store.create_job(&newer).await.unwrap();
        store
            .create_batches(&older.id, &[Window::bounded(0, 3)])
            .await
            .unwrap();

        let ids: Vec<JobId> = store.list_jobs().await.unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        assert_eq!(store.delete_completed_jobs().await.unwrap(), 1);
        assert!(store.list_batches(&older.id).await.unwrap().is_empty());
        assert_eq!(store.list_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn round_trips_configurations() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();
        let mut inactive = config().with_id("b");
        inactive.is_active = false;
        let active = config().with_id("a");

        store.save_config(&inactive).await.unwrap();
        store.save_config(&active).await.unwrap();

        assert_eq!(store.list_configs().await.unwrap().len(), 2);
        let active_ids: Vec<String> = store
            .list_active()
            .await
            .unwrap()
            .iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(active_ids, vec!["a".to_string()]);
    }
}

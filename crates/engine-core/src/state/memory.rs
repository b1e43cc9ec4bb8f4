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
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    configs: HashMap<ConfigId, MappingConfiguration>,
    jobs: HashMap<JobId, MigrationJob>,
    batches: HashMap<JobId, Vec<MigrationBatch>>,
}

/// Volatile repository for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigRepository for MemoryStore {
    async fn get_config(
        &self,
        id: &ConfigId,
    ) -> Result<Option<MappingConfiguration>, StateStoreError> {
        Ok(self.inner.read().await.configs.get(id).cloned())
    }

    async fn list_configs(&self) -> Result<Vec<MappingConfiguration>, StateStoreError> {
        let inner = self.inner.read().await;
        let mut configs: Vec<_> = inner.configs.values().cloned().collect();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    async fn save_config(&self, config: &MappingConfiguration) -> Result<(), StateStoreError> {
        self.inner
            .write()
            .await
            .configs
            .insert(config.id.clone(), config.clone());
        Ok(())
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn create_job(&self, job: &MigrationJob) -> Result<(), StateStoreError> {
        let mut inner = self.inner.write().await;
        if inner.jobs.contains_key(&job.id) {
            return Err(StateStoreError::Save(format!("job {} already exists", job.id)));
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn save_job(&self, job: &MigrationJob) -> Result<(), StateStoreError> {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(StateStoreError::NotFound(format!("job {}", job.id))),
        }
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<MigrationJob>, StateStoreError> {
        Ok(self.inner.read().await.jobs.get(id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<MigrationJob>, StateStoreError> {
        let mut jobs: Vec<_> = self.inner.read().await.jobs.values().cloned().collect();
        sort_newest_first(&mut jobs);
        Ok(jobs)
    }

    async fn create_batches(
        &self,
        job_id: &JobId,
        windows: &[Window],
    ) -> Result<Vec<MigrationBatch>, StateStoreError> {
        let mut inner = self.inner.write().await;
        if !inner.jobs.contains_key(job_id) {
            return Err(StateStoreError::NotFound(format!("job {job_id}")));
        }
        if inner.batches.get(job_id).is_some_and(|b| !b.is_empty()) {
            return Err(StateStoreError::Save(format!(
                "job {job_id} already has batches"
            )));
        }
        let batches = plan_batches(job_id, windows);
        inner.batches.insert(*job_id, batches.clone());
        Ok(batches)
    }

    async fn save_batch(&self, batch: &MigrationBatch) -> Result<(), StateStoreError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .batches
            .get_mut(&batch.job_id)
            .and_then(|batches| batches.iter_mut().find(|b| b.id == batch.id))
            .ok_or_else(|| StateStoreError::NotFound(format!("batch {}", batch.id)))?;
        *existing = batch.clone();
        Ok(())
    }

    async fn list_batches(&self, job_id: &JobId) -> Result<Vec<MigrationBatch>, StateStoreError> {
        let inner = self.inner.read().await;
        let mut batches = inner.batches.get(job_id).cloned().unwrap_or_default();
        batches.sort_by_key(|b| b.seq);
        Ok(batches)
    }

    async fn delete_completed_jobs(&self) -> Result<usize, StateStoreError> {
        let mut inner = self.inner.write().await;
        let completed: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Completed)
            .map(|j| j.id)
            .collect();
        for id in &completed {
            inner.jobs.remove(id);
            inner.batches.remove(id);
        }
        Ok(completed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MappingConfiguration {
        MappingConfiguration::new("emp", "pg", "es", "SELECT * FROM emp", "emp")
    }

    #[tokio::test]
    async fn batches_are_numbered_in_window_order() {
        let store = MemoryStore::new();
        let job = MigrationJob::new(&config(), false);
        store.create_job(&job).await.unwrap();

        let windows = vec![Window::bounded(0, 10), Window::bounded(10, 5)];
        store.create_batches(&job.id, &windows).await.unwrap();

        let batches = store.list_batches(&job.id).await.unwrap();
        assert_eq!(batches.iter().map(|b| b.seq).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(batches[1].window(), Window::bounded(10, 5));

        assert!(store.create_batches(&job.id, &windows).await.is_err());
    }

    #[tokio::test]
    async fn clearing_completed_jobs_cascades_to_batches() {
        let store = MemoryStore::new();
        let mut done = MigrationJob::new(&config(), false);
        done.status = JobStatus::Completed;
        let failed = {
            let mut j = MigrationJob::new(&config(), false);
            j.status = JobStatus::Failed;
            j
        };
        store.create_job(&done).await.unwrap();
        store.create_job(&failed).await.unwrap();
        store
            .create_batches(&done.id, &[Window::bounded(0, 1)])
            .await
            .unwrap();

        assert_eq!(store.delete_completed_jobs().await.unwrap(), 1);
        assert!(store.get_job(&done.id).await.unwrap().is_none());
        assert!(store.list_batches(&done.id).await.unwrap().is_empty());
        assert!(store.get_job(&failed.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_watermark_updates_config() {
        let store = MemoryStore::new();
        let cfg = config();
        store.save_config(&cfg).await.unwrap();

        let mark = model::pagination::watermark::Watermark::new(model::core::value::Value::Int(9));
        store
            .save_watermark(&cfg.id, Some(mark.clone()), chrono::Utc::now())
            .await
            .unwrap();

        let saved = store.get_config(&cfg.id).await.unwrap().unwrap();
        assert_eq!(saved.last_watermark, Some(mark));
        assert!(saved.last_sync_time.is_some());
    }

    #[tokio::test]
    async fn save_watermark_never_moves_backwards() {
        use model::{core::value::Value, pagination::watermark::Watermark};

        let store = MemoryStore::new();
        let cfg = config();
        store.save_config(&cfg).await.unwrap();

        let ahead = Watermark::new(Value::Int(50));
        for mark in [Some(ahead.clone()), Some(Watermark::new(Value::Int(20))), None] {
            store
                .save_watermark(&cfg.id, mark, chrono::Utc::now())
                .await
                .unwrap();
        }

        let saved = store.get_config(&cfg.id).await.unwrap().unwrap();
        assert_eq!(saved.last_watermark, Some(ahead));
    }
}

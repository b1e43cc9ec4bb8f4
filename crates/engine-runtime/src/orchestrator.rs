use crate::{
    error::MigrationError,
    execution::{factory::ConnectorFactory, fingerprint::spec_fingerprint, worker::JobWorker},
};
use chrono::Utc;
use engine_config::settings::{DEFAULT_BATCH_SIZE, EngineSettings};
use engine_core::{
    progress::{JobProgress, summarize},
    retry::RetryPolicy,
    state::StateStore,
};
use engine_processing::TransformPipeline;
use model::{
    core::identifiers::{ConfigId, JobId},
    execution::{
        batch::{BatchStatus, MigrationBatch},
        configuration::MappingConfiguration,
        job::{JobSpec, JobStatus, MigrationJob},
    },
    pagination::window::Window,
    records::document::Document,
};
use planner::ExtractQuery;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Engine-wide knobs shared by every job.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub batch_size: u64,
    pub connect_retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            connect_retry: RetryPolicy::default(),
        }
    }
}

impl RunOptions {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        let defaults = RetryPolicy::default();
        RunOptions {
            batch_size: settings.batch_size,
            connect_retry: RetryPolicy::new(
                settings.connect_retries as usize,
                defaults.base_delay,
                defaults.max_delay,
            ),
        }
    }

    /// Single connection attempt without backoff.
    pub fn without_retries(mut self) -> Self {
        self.connect_retry = RetryPolicy::none();
        self
    }
}

type ActiveRuns = Arc<Mutex<HashMap<ConfigId, (JobId, CancellationToken)>>>;

fn lock(active: &ActiveRuns) -> MutexGuard<'_, HashMap<ConfigId, (JobId, CancellationToken)>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Releases the per-configuration execution lock when the worker ends,
/// however it ends.
struct ActiveGuard {
    active: ActiveRuns,
    config_id: ConfigId,
    job_id: JobId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut runs = lock(&self.active);
        if runs
            .get(&self.config_id)
            .is_some_and(|(job_id, _)| *job_id == self.job_id)
        {
            runs.remove(&self.config_id);
        }
    }
}

/// Handle to a job running in the background.
#[derive(Debug)]
pub struct RunningJob {
    job_id: JobId,
    handle: JoinHandle<Result<MigrationJob, MigrationError>>,
}

impl RunningJob {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Waits for the worker and returns the final job snapshot.
    pub async fn wait(self) -> Result<MigrationJob, MigrationError> {
        self.handle.await?
    }
}

/// Owns job and batch state transitions and the background workers that
/// drive them.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn StateStore>,
    factory: Arc<dyn ConnectorFactory>,
    options: RunOptions,
    active: ActiveRuns,
    create_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        factory: Arc<dyn ConnectorFactory>,
        options: RunOptions,
    ) -> Self {
        Orchestrator {
            store,
            factory,
            options,
            active: Arc::new(Mutex::new(HashMap::new())),
            create_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub async fn save_configuration(
        &self,
        config: &MappingConfiguration,
    ) -> Result<(), MigrationError> {
        let mut config = config.clone();
        config.touch();
        self.store.save_config(&config).await?;
        info!(config_id = %config.id, name = %config.name, "Saved configuration");
        Ok(())
    }

    pub async fn get_configuration(
        &self,
        id: &ConfigId,
    ) -> Result<MappingConfiguration, MigrationError> {
        self.store
            .get_config(id)
            .await?
            .ok_or_else(|| MigrationError::ConfigurationNotFound(id.clone()))
    }

    pub async fn list_configurations(&self) -> Result<Vec<MappingConfiguration>, MigrationError> {
        Ok(self.store.list_configs().await?)
    }

    /// Creates a pending job for the configuration. `incremental` defaults
    /// to whether the configuration has a watermark column. A never-started
    /// pending job with the same snapshot and mode is returned instead of a
    /// duplicate.
    pub async fn create_job(
        &self,
        config_id: &ConfigId,
        incremental: Option<bool>,
    ) -> Result<MigrationJob, MigrationError> {
        let _serialized = self.create_lock.lock().await;

        let config = self.get_configuration(config_id).await?;
        let incremental = incremental.unwrap_or_else(|| config.supports_incremental());
        if incremental && !config.supports_incremental() {
            return Err(MigrationError::InvalidConfiguration(format!(
                "configuration {config_id} has no watermark column for an incremental run"
            )));
        }

        let fingerprint = spec_fingerprint(&JobSpec::from_config(&config, incremental));
        let existing = self.store.list_jobs().await?.into_iter().find(|job| {
            job.config_id == *config_id
                && job.incremental == incremental
                && job.is_unstarted()
                && spec_fingerprint(&job.spec) == fingerprint
        });
        if let Some(job) = existing {
            info!(job_id = %job.id, %config_id, "Reusing pending job");
            return Ok(job);
        }

        let job = MigrationJob::new(&config, incremental);
        self.store.create_job(&job).await?;
        info!(job_id = %job.id, %config_id, incremental, %fingerprint, "Created job");
        Ok(job)
    }

    /// Creates (or reuses) a job and starts it.
    pub async fn submit(
        &self,
        config_id: &ConfigId,
        incremental: Option<bool>,
    ) -> Result<RunningJob, MigrationError> {
        let job = self.create_job(config_id, incremental).await?;
        self.start_migration(&job.id).await
    }

    /// Starts a pending job in the background. Rejected with a conflict when
    /// another job of the same configuration is running.
    pub async fn start_migration(&self, job_id: &JobId) -> Result<RunningJob, MigrationError> {
        let mut job = self.get_job(job_id).await?;
        if job.status != JobStatus::Pending {
            return Err(MigrationError::InvalidState {
                job_id: job.id,
                status: job.status,
                operation: "start",
            });
        }

        let cancel = CancellationToken::new();
        let guard = self.claim(&job, cancel.clone())?;

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        job.completed_at = None;
        self.store.save_job(&job).await?;

        let worker = JobWorker {
            store: Arc::clone(&self.store),
            factory: Arc::clone(&self.factory),
            batch_size: self.options.batch_size,
            connect_retry: self.options.connect_retry.clone(),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            worker.run(job, cancel).await
        });

        Ok(RunningJob {
            job_id: *job_id,
            handle,
        })
    }

    fn claim(
        &self,
        job: &MigrationJob,
        cancel: CancellationToken,
    ) -> Result<ActiveGuard, MigrationError> {
        let mut runs = lock(&self.active);
        if let Some((running, _)) = runs.get(&job.config_id) {
            return Err(MigrationError::Conflict {
                config_id: job.config_id.clone(),
                job_id: *running,
            });
        }
        runs.insert(job.config_id.clone(), (job.id, cancel));
        Ok(ActiveGuard {
            active: Arc::clone(&self.active),
            config_id: job.config_id.clone(),
            job_id: job.id,
        })
    }

    fn is_active(&self, job: &MigrationJob) -> bool {
        lock(&self.active)
            .get(&job.config_id)
            .is_some_and(|(job_id, _)| *job_id == job.id)
    }

    /// Requests a cooperative stop. The worker halts before its next batch;
    /// this returns without waiting for it.
    pub async fn stop_migration(&self, job_id: &JobId) -> Result<MigrationJob, MigrationError> {
        let mut job = self.get_job(job_id).await?;
        if job.status != JobStatus::Running {
            return Err(MigrationError::InvalidState {
                job_id: job.id,
                status: job.status,
                operation: "stop",
            });
        }

        let token = lock(&self.active)
            .get(&job.config_id)
            .filter(|(running, _)| running == job_id)
            .map(|(_, token)| token.clone());

        match token {
            Some(token) => {
                token.cancel();
                info!(%job_id, "Stop requested");
            }
            None => {
                warn!(%job_id, "Job is marked running but has no worker; marking it stopped");
                job.status = JobStatus::Stopped;
                job.completed_at = Some(Utc::now());
                self.store.save_job(&job).await?;
            }
        }
        Ok(job)
    }

    /// Returns a failed or stopped job to `pending`. Completed batches and
    /// the records they processed are kept; every other batch is reset.
    pub async fn retry_migration(&self, job_id: &JobId) -> Result<MigrationJob, MigrationError> {
        let mut job = self.get_job(job_id).await?;
        if !matches!(job.status, JobStatus::Failed | JobStatus::Stopped) {
            return Err(MigrationError::InvalidState {
                job_id: job.id,
                status: job.status,
                operation: "retry",
            });
        }
        if self.is_active(&job) {
            return Err(MigrationError::Conflict {
                config_id: job.config_id.clone(),
                job_id: job.id,
            });
        }

        let mut batches = self.store.list_batches(job_id).await?;
        let mut reset = 0;
        for batch in batches.iter_mut().filter(|b| !b.is_completed()) {
            batch.reset();
            self.store.save_batch(batch).await?;
            reset += 1;
        }

        job.processed_records = batches
            .iter()
            .filter(|b| b.is_completed())
            .map(|b| b.processed_records)
            .sum();
        job.failed_records = 0;
        job.error_message = None;
        job.completed_at = None;
        job.status = JobStatus::Pending;
        if batches.iter().any(|b| b.limit.is_none()) {
            job.total_records = None;
        }
        self.store.save_job(&job).await?;

        info!(%job_id, reset_batches = reset, kept_records = job.processed_records, "Job queued for retry");
        Ok(job)
    }

    /// Runs the configuration's query for at most `limit` rows and returns
    /// the transformed documents. Touches neither the destination nor any
    /// job state.
    pub async fn preview_migration(
        &self,
        config: &MappingConfiguration,
        limit: u64,
    ) -> Result<Vec<Document>, MigrationError> {
        let pipeline = TransformPipeline::from_parts(
            &config.field_mappings,
            &config.transformation_rules,
            config.document_id_field.clone(),
        )?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = ExtractQuery::new(&config.source_query)?;
        let source = self.factory.source(&config.source_connection).await?;
        let rows = source
            .run(&query, &Window::bounded(0, limit))
            .await
            .map_err(MigrationError::from_source)?;

        let docs = pipeline.apply_all(&rows)?;
        info!(config_id = %config.id, rows = docs.len(), "Previewed configuration");
        Ok(docs)
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<MigrationJob, MigrationError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(MigrationError::JobNotFound(*job_id))
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<MigrationJob>, MigrationError> {
        Ok(self.store.list_jobs().await?)
    }

    pub async fn get_job_batches(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<MigrationBatch>, MigrationError> {
        self.get_job(job_id).await?;
        Ok(self.store.list_batches(job_id).await?)
    }

    pub async fn job_progress(&self, job_id: &JobId) -> Result<JobProgress, MigrationError> {
        let job = self.get_job(job_id).await?;
        let batches = self.store.list_batches(job_id).await?;
        Ok(summarize(&job, &batches))
    }

    /// Deletes every completed job and its batches.
    pub async fn clear_completed_jobs(&self) -> Result<usize, MigrationError> {
        let removed = self.store.delete_completed_jobs().await?;
        info!(removed, "Cleared completed jobs");
        Ok(removed)
    }

    /// Batches that ended in `failed` for a job, in planning order.
    pub async fn failed_batches(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<MigrationBatch>, MigrationError> {
        Ok(self
            .get_job_batches(job_id)
            .await?
            .into_iter()
            .filter(|b| b.status == BatchStatus::Failed)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::{ConnectorError, DestinationIndex, SourceQuery};
    use engine_core::state::{JobRepository, memory::MemoryStore};

    struct Unreachable;

    #[async_trait]
    impl ConnectorFactory for Unreachable {
        async fn source(&self, _: &str) -> Result<Arc<dyn SourceQuery>, MigrationError> {
            Err(MigrationError::Connection(ConnectorError::Connection(
                "refused".into(),
            )))
        }

        async fn destination(&self, _: &str) -> Result<Arc<dyn DestinationIndex>, MigrationError> {
            Err(MigrationError::Connection(ConnectorError::Connection(
                "refused".into(),
            )))
        }
    }

    async fn orchestrator() -> (Orchestrator, Arc<MemoryStore>, MappingConfiguration) {
        let store = Arc::new(MemoryStore::new());
        let config = MappingConfiguration::new("orders", "pg", "es", "SELECT * FROM orders", "orders")
            .with_id("orders");
        let orch = Orchestrator::new(
            store.clone(),
            Arc::new(Unreachable),
            RunOptions::default().without_retries(),
        );
        orch.save_configuration(&config).await.unwrap();
        (orch, store, config)
    }

    #[tokio::test]
    async fn create_job_reuses_unstarted_job() {
        let (orch, store, config) = orchestrator().await;
        let first = orch.create_job(&config.id, None).await.unwrap();
        let second = orch.create_job(&config.id, None).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!first.incremental);
        assert_eq!(store.list_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn incremental_requires_watermark_column() {
        let (orch, _, config) = orchestrator().await;
        let err = orch.create_job(&config.id, Some(true)).await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidConfiguration(_)));

        let err = orch
            .create_job(&ConfigId::new("missing"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::ConfigurationNotFound(_)));
    }

    #[tokio::test]
    async fn unreachable_source_fails_the_job() {
        let (orch, _, config) = orchestrator().await;
        let job = orch
            .submit(&config.id, None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("refused"));
        assert!(orch.get_job_batches(&job.id).await.unwrap().is_empty());

        let err = orch.start_migration(&job.id).await.unwrap_err();
        assert!(matches!(
            err,
            MigrationError::InvalidState {
                operation: "start",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stale_running_job_is_stopped_directly() {
        let (orch, store, config) = orchestrator().await;
        let mut job = orch.create_job(&config.id, None).await.unwrap();
        job.status = JobStatus::Running;
        store.save_job(&job).await.unwrap();

        let stopped = orch.stop_migration(&job.id).await.unwrap();
        assert_eq!(stopped.status, JobStatus::Stopped);

        let retried = orch.retry_migration(&job.id).await.unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert!(orch.stop_migration(&job.id).await.is_err());
    }

    #[tokio::test]
    async fn preview_with_zero_limit_skips_the_source() {
        let (orch, _, config) = orchestrator().await;
        let docs = orch.preview_migration(&config, 0).await.unwrap();
        assert!(docs.is_empty());

        let err = orch.preview_migration(&config, 5).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let (orch, _, _) = orchestrator().await;
        let id = JobId::new();
        assert!(matches!(
            orch.get_job(&id).await,
            Err(MigrationError::JobNotFound(_))
        ));
        assert!(matches!(
            orch.job_progress(&id).await,
            Err(MigrationError::JobNotFound(_))
        ));
    }
}

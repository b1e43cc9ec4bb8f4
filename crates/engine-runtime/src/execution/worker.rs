use crate::{error::MigrationError, execution::factory::ConnectorFactory};
use chrono::Utc;
use connectors::{DestinationIndex, SourceQuery};
use engine_core::{
    metrics::Metrics,
    retry::{RetryDisposition, RetryPolicy},
    state::StateStore,
};
use engine_processing::{BatchExecutor, TransformPipeline, planning};
use model::{
    execution::{
        batch::{BatchStatus, MigrationBatch},
        job::{JobStatus, MigrationJob},
    },
    pagination::watermark::Watermark,
};
use planner::BatchPlanner;
use std::{future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Drives one job from `running` to a terminal status.
pub(crate) struct JobWorker {
    pub store: Arc<dyn StateStore>,
    pub factory: Arc<dyn ConnectorFactory>,
    pub batch_size: u64,
    pub connect_retry: RetryPolicy,
}

enum Ending {
    Finished,
    Stopped,
}

impl JobWorker {
    /// Runs the job and returns its final snapshot. Job-level failures are
    /// recorded on the job; only state store failures are returned.
    pub async fn run(
        &self,
        mut job: MigrationJob,
        cancel: CancellationToken,
    ) -> Result<MigrationJob, MigrationError> {
        let metrics = Metrics::new();
        info!(job_id = %job.id, config_id = %job.config_id, incremental = job.incremental, "Job started");

        match self.execute(&mut job, &cancel, &metrics).await {
            Ok(Ending::Stopped) => {
                job.status = JobStatus::Stopped;
                info!(job_id = %job.id, "Job stopped");
            }
            Ok(Ending::Finished) => self.finish(&mut job).await?,
            Err(MigrationError::State(err)) => return Err(MigrationError::State(err)),
            Err(err) => {
                error!(job_id = %job.id, error = %err, "Job aborted");
                job.status = JobStatus::Failed;
                job.error_message = Some(err.to_string());
            }
        }

        job.completed_at = Some(Utc::now());
        self.store.save_job(&job).await?;

        let snapshot = metrics.snapshot();
        info!(
            job_id = %job.id,
            status = %job.status,
            records = snapshot.records_processed,
            failed_records = snapshot.records_failed,
            batches = snapshot.batches_processed,
            failed_batches = snapshot.batches_failed,
            bytes = snapshot.bytes_transferred,
            elapsed_secs = job.duration().map(|d| d.num_seconds()).unwrap_or_default(),
            "Job finished"
        );
        Ok(job)
    }

    async fn execute(
        &self,
        job: &mut MigrationJob,
        cancel: &CancellationToken,
        metrics: &Metrics,
    ) -> Result<Ending, MigrationError> {
        let pipeline = TransformPipeline::from_spec(&job.spec)?;
        let planner = BatchPlanner::new(self.batch_size)?;

        let (source, destination) = self.connect(job).await?;
        let base_query = job.spec.source_query.as_str();
        let watermark = job.spec.watermark.as_ref();
        let order_key = job.spec.order_key.as_deref();

        let mut batches = self.store.list_batches(&job.id).await?;
        let query = if batches.is_empty() {
            let plan =
                planning::plan_job(source.as_ref(), &planner, base_query, watermark, order_key)
                    .await?;
            job.total_records = plan.total;
            self.store.save_job(job).await?;
            batches = self.store.create_batches(&job.id, &plan.windows).await?;
            plan.query
        } else {
            info!(job_id = %job.id, batches = batches.len(), "Resuming planned batches");
            planning::extract_query(source.as_ref(), &planner, base_query, watermark, order_key)
                .await?
        };

        let executor = BatchExecutor::new(
            source,
            destination,
            pipeline,
            query,
            job.spec.destination_index.clone(),
            self.batch_size,
        )
        .with_watermark(job.spec.watermark.clone());

        for batch in batches.iter_mut().filter(|b| !b.is_completed()) {
            if cancel.is_cancelled() {
                info!(job_id = %job.id, next_batch = batch.seq, "Stop requested");
                return Ok(Ending::Stopped);
            }
            self.run_batch(job, batch, &executor, metrics).await?;
        }
        Ok(Ending::Finished)
    }

    async fn connect(
        &self,
        job: &MigrationJob,
    ) -> Result<(Arc<dyn SourceQuery>, Arc<dyn DestinationIndex>), MigrationError> {
        let source = self
            .with_retry(|| self.factory.source(&job.spec.source_connection))
            .await?;
        let destination = self
            .with_retry(|| self.factory.destination(&job.spec.destination_connection))
            .await?;
        self.with_retry(|| async {
            destination
                .ping()
                .await
                .map_err(MigrationError::Connection)
        })
        .await?;
        Ok((source, destination))
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, MigrationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MigrationError>>,
    {
        self.connect_retry
            .run(op, |err: &MigrationError| {
                if err.is_connection() {
                    RetryDisposition::Retry
                } else {
                    RetryDisposition::Stop
                }
            })
            .await
            .map_err(|e| e.into_inner())
    }

    async fn run_batch(
        &self,
        job: &mut MigrationJob,
        batch: &mut MigrationBatch,
        executor: &BatchExecutor,
        metrics: &Metrics,
    ) -> Result<(), MigrationError> {
        batch.status = BatchStatus::Running;
        batch.started_at = Some(Utc::now());
        batch.completed_at = None;
        batch.error_message = None;
        self.store.save_batch(batch).await?;

        let result = executor.run(&batch.window()).await;
        batch.completed_at = Some(Utc::now());

        match result {
            Ok(outcome) => {
                batch.status = BatchStatus::Completed;
                batch.processed_records = outcome.rows;
                batch.max_watermark = outcome.max_watermark;
                self.store.save_batch(batch).await?;

                job.processed_records += outcome.rows;
                self.store.save_job(job).await?;

                metrics.increment_records(outcome.rows);
                metrics.increment_bytes(outcome.bytes);
                metrics.increment_batches(1);
                info!(job_id = %job.id, batch = batch.seq, rows = outcome.rows, "Batch completed");
                Ok(())
            }
            Err(err) => {
                batch.status = BatchStatus::Failed;
                batch.error_message = Some(err.to_string());
                self.store.save_batch(batch).await?;
                metrics.increment_failed_batches(1);

                if err.is_connection() {
                    return Err(err.into());
                }

                job.failed_records += err.attempted();
                job.error_message = Some(format!("batch {}: {err}", batch.seq));
                self.store.save_job(job).await?;

                metrics.increment_failed_records(err.attempted());
                warn!(job_id = %job.id, batch = batch.seq, error = %err, "Batch failed");
                Ok(())
            }
        }
    }

    /// Settles the status after every batch was visited and advances the
    /// watermark of a fully successful incremental job.
    async fn finish(&self, job: &mut MigrationJob) -> Result<(), MigrationError> {
        let batches = self.store.list_batches(&job.id).await?;
        let failed = batches
            .iter()
            .filter(|b| b.status == BatchStatus::Failed)
            .count();

        if job.total_records.is_none() {
            job.total_records = Some(job.processed_records + job.failed_records);
        }

        if failed > 0 {
            job.status = JobStatus::Failed;
            warn!(job_id = %job.id, failed_batches = failed, "Job finished with failed batches");
            return Ok(());
        }

        job.status = JobStatus::Completed;
        job.error_message = None;

        if job.incremental {
            let reached = batches
                .iter()
                .filter(|b| b.is_completed())
                .fold(None, |max, b| Watermark::max(max, b.max_watermark.clone()));
            info!(job_id = %job.id, watermark = ?reached.as_ref().map(|w| &w.value), "Advancing watermark");
            self.store
                .save_watermark(&job.config_id, reached, Utc::now())
                .await?;
        }
        Ok(())
    }
}

use connectors::ConnectorError;
use engine_config::{SchemaError, settings::SettingsError};
use engine_core::error::StateStoreError;
use engine_processing::{BatchError, PlanError, TransformError};
use model::{
    core::identifiers::{ConfigId, JobId},
    execution::job::JobStatus,
};
use planner::PlanningError;
use thiserror::Error;

/// Errors surfaced by the migration orchestrator.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Another job of the same configuration is running. Nothing changed.
    #[error("Configuration {config_id} already has a running job ({job_id})")]
    Conflict { config_id: ConfigId, job_id: JobId },

    /// Source or destination unreachable. Retrying the job later may help.
    #[error("Connection error: {0}")]
    Connection(ConnectorError),

    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    #[error("Extraction error: {0}")]
    Extraction(ConnectorError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Load error: {0}")]
    Load(ConnectorError),

    #[error("Cannot {operation} job {job_id} while it is {status}")]
    InvalidState {
        job_id: JobId,
        status: JobStatus,
        operation: &'static str,
    },

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Configuration not found: {0}")]
    ConfigurationNotFound(ConfigId),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The job task panicked or was aborted.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl MigrationError {
    pub fn is_connection(&self) -> bool {
        matches!(self, MigrationError::Connection(_))
    }

    pub(crate) fn from_source(err: ConnectorError) -> Self {
        if err.is_connection() {
            MigrationError::Connection(err)
        } else {
            MigrationError::Extraction(err)
        }
    }
}

impl From<BatchError> for MigrationError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Extraction { source, .. } => MigrationError::Extraction(source),
            BatchError::Transform { source, .. } => MigrationError::Transform(source),
            BatchError::Load { source, .. } => MigrationError::Load(source),
            BatchError::Connection(source) => MigrationError::Connection(source),
        }
    }
}

impl From<PlanError> for MigrationError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Planning(e) => MigrationError::Planning(e),
            PlanError::Connection(e) => MigrationError::Connection(e),
        }
    }
}

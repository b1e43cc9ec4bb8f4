use engine_config::{SchemaError, settings::SettingsError};
use engine_core::error::StateStoreError;
use engine_runtime::MigrationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// Malformed `.env` file or unresolved `${VAR}` reference.
    #[error("Environment error: {0}")]
    Env(String),

    #[error("Failed to parse configuration JSON: {0}")]
    ConfigDeserialize(#[from] serde_json::Error),

    #[error("Failed to open state store: {0}")]
    State(#[from] StateStoreError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    Migration(#[from] MigrationError),

    /// The job ran to the end but did not complete.
    #[error("Job {job_id} ended as {status}")]
    JobUnsuccessful { job_id: String, status: String },

    #[error("Shutdown requested")]
    ShutdownRequested,
}

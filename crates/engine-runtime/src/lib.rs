pub mod error;
pub mod execution;
pub mod orchestrator;

pub use error::MigrationError;
pub use execution::factory::{ConnectorFactory, SettingsConnectorFactory};
pub use orchestrator::{Orchestrator, RunOptions, RunningJob};

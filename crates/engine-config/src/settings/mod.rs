use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

pub mod connection;
pub mod error;

pub use connection::ConnectionSettings;
pub use error::SettingsError;

pub const DEFAULT_SETTINGS_FILE: &str = "ferry.toml";
pub const DEFAULT_BATCH_SIZE: u64 = 1000;
pub const DEFAULT_LOG_FILTER: &str = "info";

const ENV_BATCH_SIZE: &str = "FERRY_BATCH_SIZE";
const ENV_STATE_DIR: &str = "FERRY_STATE_DIR";
const ENV_LOG: &str = "FERRY_LOG";

/// Engine-wide settings, read from `ferry.toml` and the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Rows per extraction window. Fixed for every job.
    pub batch_size: u64,
    pub state_dir: PathBuf,
    pub log_filter: String,
    /// Deadline for each source statement.
    pub query_timeout_secs: Option<u64>,
    /// Attempts made to open a connection before a job fails.
    pub connect_retries: u32,
    pub connections: BTreeMap<String, ConnectionSettings>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            batch_size: DEFAULT_BATCH_SIZE,
            state_dir: default_state_dir(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            query_timeout_secs: None,
            connect_retries: 3,
            connections: BTreeMap::new(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ferry")
        .join("state")
}

impl EngineSettings {
    /// Loads settings from `path`, or from `ferry.toml` in the working
    /// directory when no path is given. A missing default file yields the
    /// defaults; a missing explicit file is an error. Environment overrides
    /// are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    debug!("No {DEFAULT_SETTINGS_FILE} found, using defaults");
                    EngineSettings::default()
                }
            }
        };
        settings.apply_overrides(|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&text)?;
        info!(path = %path.display(), connections = settings.connections.len(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `FERRY_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            self.batch_size =
                raw.trim()
                    .parse()
                    .map_err(|_| SettingsError::InvalidValue {
                        key: ENV_BATCH_SIZE.to_string(),
                        reason: format!("`{raw}` is not a positive integer"),
                    })?;
        }
        if let Some(dir) = lookup(ENV_STATE_DIR).filter(|d| !d.trim().is_empty()) {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.trim().is_empty()) {
            self.log_filter = filter;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.batch_size == 0 {
            return Err(SettingsError::InvalidValue {
                key: "batch_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        for (name, conn) in &self.connections {
            if conn.url().trim().is_empty() {
                return Err(SettingsError::InvalidValue {
                    key: format!("connections.{name}.url"),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::UnknownConnection(name.to_string()))
    }

    /// Looks up a connection usable as a relational source.
    pub fn source_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        let conn = self.connection(name)?;
        if !conn.is_source() {
            return Err(SettingsError::WrongConnectionKind {
                name: name.to_string(),
                expected: "postgres",
                found: conn.kind(),
            });
        }
        Ok(conn)
    }

    /// Looks up a connection usable as a search index destination.
    pub fn destination_connection(
        &self,
        name: &str,
    ) -> Result<&ConnectionSettings, SettingsError> {
        let conn = self.connection(name)?;
        if !conn.is_destination() {
            return Err(SettingsError::WrongConnectionKind {
                name: name.to_string(),
                expected: "elasticsearch",
                found: conn.kind(),
            });
        }
        Ok(conn)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }
}

use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors raised while loading or resolving engine settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting or environment override holds an unusable value.
    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// The named connection exists but points at the wrong kind of system.
    #[error("Connection `{name}` is a {found} connection, expected {expected}")]
    WrongConnectionKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

use std::time::Duration;
use thiserror::Error;

/// Errors raised by source and destination connectors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConnectorError {
    /// The remote end is unreachable or the session was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    /// The database rejected a statement.
    #[error("Query error: {0}")]
    Query(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The destination accepted the request but rejected some documents.
    #[error("Bulk request rejected {failed} document(s): {reason}")]
    Bulk { failed: usize, reason: String },

    #[error("Failed to decode column `{column}`: {reason}")]
    Decode { column: String, reason: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ConnectorError {
    /// Transient connectivity faults. Retrying the whole job later may help.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            ConnectorError::Connection(_) | ConnectorError::InvalidUrl(_)
        )
    }
}

impl From<native_tls::Error> for ConnectorError {
    fn from(err: native_tls::Error) -> Self {
        ConnectorError::Connection(format!("TLS setup failed: {err}"))
    }
}

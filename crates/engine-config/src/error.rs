use connectors::ConnectorError;
use thiserror::Error;

/// Errors raised while introspecting a source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// The source rejected the query. Needs a human to fix it.
    #[error("Failed to analyze query `{query}`: {source}")]
    QueryAnalysis {
        query: String,
        #[source]
        source: ConnectorError,
    },

    /// The source is unreachable. Safe to retry later.
    #[error("Connection error: {0}")]
    Connection(#[source] ConnectorError),

    #[error("Metadata error: {0}")]
    Metadata(#[source] ConnectorError),
}

impl SchemaError {
    pub fn is_connection(&self) -> bool {
        matches!(self, SchemaError::Connection(_))
    }

    pub(crate) fn analysis(query: &str, err: ConnectorError) -> Self {
        if is_transient(&err) {
            SchemaError::Connection(err)
        } else {
            SchemaError::QueryAnalysis {
                query: query.to_string(),
                source: err,
            }
        }
    }

    pub(crate) fn metadata(err: ConnectorError) -> Self {
        if is_transient(&err) {
            SchemaError::Connection(err)
        } else {
            SchemaError::Metadata(err)
        }
    }
}

fn is_transient(err: &ConnectorError) -> bool {
    err.is_connection() || matches!(err, ConnectorError::Timeout(_))
}

use connectors::ConnectorError;
use planner::PlanningError;
use thiserror::Error;

/// A row could not be turned into a document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("Source field `{0}` is missing from the row")]
    MissingField(String),

    #[error("Cannot coerce {kind} value of `{field}` to {target}")]
    Coercion {
        field: String,
        kind: &'static str,
        target: String,
    },

    /// A mapping names a transformation rule that does not exist.
    #[error("Unknown transformation rule: {0}")]
    UnknownRule(String),

    #[error("Invalid transformation rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// Failure of one batch. Everything except `Connection` is isolated to the
/// batch; `attempted` is the number of rows the batch gave up on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BatchError {
    #[error("Extraction failed: {source}")]
    Extraction {
        attempted: u64,
        #[source]
        source: ConnectorError,
    },

    #[error("Transform failed: {source}")]
    Transform {
        attempted: u64,
        #[source]
        source: TransformError,
    },

    #[error("Load failed: {source}")]
    Load {
        attempted: u64,
        #[source]
        source: ConnectorError,
    },

    #[error("Connection lost: {0}")]
    Connection(#[source] ConnectorError),
}

impl BatchError {
    pub fn attempted(&self) -> u64 {
        match self {
            BatchError::Extraction { attempted, .. }
            | BatchError::Transform { attempted, .. }
            | BatchError::Load { attempted, .. } => *attempted,
            BatchError::Connection(_) => 0,
        }
    }

    /// Connection faults abort the whole job instead of one batch.
    pub fn is_connection(&self) -> bool {
        matches!(self, BatchError::Connection(_))
    }
}

/// The batches of a job could not be determined.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("Connection lost while planning: {0}")]
    Connection(#[source] ConnectorError),
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    #[error("Batch size must be greater than zero, got {0}")]
    InvalidBatchSize(u64),

    #[error("Watermark column `{column}` holds a {kind} value that cannot be rendered as a literal")]
    UnsupportedWatermarkValue { column: String, kind: &'static str },

    #[error("Failed to count source rows: {0}")]
    Count(String),

    #[error("Source query is empty")]
    EmptyQuery,

    #[error("Failed to describe the source query: {0}")]
    Describe(String),

    #[error("Source query returns no columns to order pages by")]
    NoOrderColumns,
}

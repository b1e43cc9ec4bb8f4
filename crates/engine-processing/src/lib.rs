pub mod batch;
pub mod error;
pub mod planning;
pub mod transform;

pub use batch::{BatchExecutor, BatchOutcome};
pub use error::{BatchError, PlanError, TransformError};
pub use transform::pipeline::TransformPipeline;

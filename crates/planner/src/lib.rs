pub mod error;
pub mod query;
pub mod windows;

pub use error::PlanningError;
pub use query::{dialect::Dialect, extract::ExtractQuery};
pub use windows::BatchPlanner;

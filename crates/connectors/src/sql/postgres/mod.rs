pub mod row;
pub mod source;
pub(crate) mod utils;

pub use source::PgSource;

pub mod destination;
pub mod error;
pub mod metadata;
pub mod search;
pub mod source;
pub mod sql;

pub use destination::DestinationIndex;
pub use error::ConnectorError;
pub use source::SourceQuery;

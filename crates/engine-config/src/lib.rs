pub mod error;
pub mod mapping;
pub mod schema;
pub mod settings;

pub use error::SchemaError;
pub use mapping::{auto::generate_auto_mapping, validator::validate_mappings};
pub use schema::introspector::SchemaIntrospector;
pub use settings::EngineSettings;

pub mod field_type;
pub mod identifiers;
pub mod source_type;
pub mod type_map;
pub mod value;

pub mod mapping;
pub mod rule;

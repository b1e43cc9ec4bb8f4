pub mod coerce;
pub mod mapping;
pub mod pipeline;
pub mod rules;

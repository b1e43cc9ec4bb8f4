pub mod batch;
pub mod configuration;
pub mod job;

pub mod bulk;
pub mod client;

pub use client::{ElasticIndex, ElasticSettings};

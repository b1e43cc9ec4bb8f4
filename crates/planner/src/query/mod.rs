pub mod dialect;
pub mod extract;

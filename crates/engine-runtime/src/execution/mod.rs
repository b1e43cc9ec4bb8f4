pub mod factory;
pub mod fingerprint;
pub mod worker;

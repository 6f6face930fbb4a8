//! Domain layer for the Foreman scheduler
//!
//! Entity models, error types and the ports adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};

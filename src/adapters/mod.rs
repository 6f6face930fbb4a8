//! Infrastructure adapters for external systems.

pub mod runners;
pub mod sqlite;
pub mod usage;

//! Usage source implementations.

pub mod chatgpt;
pub mod fixed;

pub use chatgpt::{ChatGptUsageSource, UsageError};
pub use fixed::FixedUsageSource;

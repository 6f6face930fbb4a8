//! Agent runner implementations.

pub mod cli;
pub mod mock;

pub use cli::{build_argv, CliRunner, RunnerError};
pub use mock::{MockBehavior, MockRunner};

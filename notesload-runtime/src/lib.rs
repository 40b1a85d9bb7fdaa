pub mod cli;
pub mod runtime;

mod error;

pub use crate::cli::NotesloadCli;
pub use crate::error::RuntimeError;
pub use crate::runtime::{LoadTestRuntime, RunOutcome};

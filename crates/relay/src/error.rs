//! Errors at the daemon boundary: the exit-code mapping the `run`
//! entrypoint uses (spec.md §6).

use thiserror::Error;

pub use crate::config::LoadError;
pub use sluice_core::error::{BuildError, ParseError};

/// Top-level error for the `run` entrypoint, carrying the exit code
/// spec.md §6 assigns to each failure class: `0` normal shutdown (not an
/// error), `2` config load/pipeline construction error, `1` unexpected
/// runtime failure.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] LoadError),

    #[error("pipeline construction failed: {0}")]
    Construction(#[from] BuildError),

    #[error("unexpected runtime failure: {0}")]
    Runtime(#[source] anyhow::Error),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Load(_) | RunError::Construction(_) => 2,
            RunError::Runtime(_) => 1,
        }
    }
}

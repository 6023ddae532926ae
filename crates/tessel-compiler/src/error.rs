//! Error types.

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::vm::VmError;

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by a compilation session.
#[derive(Error, Debug)]
pub enum Error {
    /// The source has semantic errors; nothing was emitted
    #[error("compilation failed with {} error(s)", .0.error_count())]
    Semantic(Diagnostics),

    /// An invariant between compiler phases was broken
    #[error("internal compiler error: {0}")]
    Internal(String),

    /// The VM hit a fault
    #[error("runtime fault: {0}")]
    Runtime(#[from] VmError),

    /// A configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Builds an [`Error::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

//! Error types for the command-line shell.

use flockscope_core::FlockError;
use thiserror::Error;

/// Errors that end a shell invocation with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    /// Decoding or analysis failed
    #[error("{0}")]
    Flock(#[from] FlockError),

    /// Reading a config file or writing an output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output could not be produced
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Argument combination that clap cannot reject on its own
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    /// Creates an invalid-argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

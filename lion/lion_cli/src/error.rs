//! Error types for the Lion CLI.

use thiserror::Error;

/// Errors that can occur in the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] lion_core::Error),

    #[error(transparent)]
    Policy(#[from] lion_core::error::PolicyError),

    #[error(transparent)]
    Construction(#[from] lion_core::error::ConstructionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid command arguments: {0}")]
    InvalidArguments(String),

    #[error("{0} of {1} policy entries are malformed")]
    InvalidPolicy(usize, usize),
}

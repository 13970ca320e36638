//! Error types for the Lion permission engine.
//!
//! This module defines the error hierarchy shared by the permission model,
//! the policy engine and the command-line front end.

use std::fmt;

use thiserror::Error;

/// Root error type for the Lion system.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Self::Policy(PolicyError::Format(err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A malformed canonical policy encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    message: String,
    offset: usize,
}

impl FormatError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the input where decoding stopped.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for FormatError {}

/// Errors related to conditional policy administration.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Malformed policy entry: {0}")]
    Format(#[from] FormatError),

    #[error("Policy entry already exists: {0}")]
    DuplicateName(String),

    #[error("Policy entry not found: {0}")]
    EntryNotFound(String),

    #[error("Policy entry has been deleted")]
    Deleted,

    #[error("Policy storage failed: {0}")]
    Storage(String),

    #[error("Invalid policy configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors related to permission collections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Permission collection is read-only")]
    ReadOnly,

    #[error("Enumeration is not supported: {0}")]
    EnumerationUnsupported(String),

    #[error("Invalid permission: {0}")]
    Invalid(String),
}

/// Failure to build a single condition or permission instance.
///
/// Construction errors are scoped to one record. They are reported, never
/// returned from a permission check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("No usable constructor for type: {0}")]
    NoConstructor(String),

    #[error("Construction of {type_name} failed: {reason}")]
    Failed { type_name: String, reason: String },

    #[error("Construction of {0} panicked")]
    Panicked(String),
}

impl ConstructionError {
    pub fn failed(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type used throughout the Lion system.
pub type Result<T> = std::result::Result<T, Error>;

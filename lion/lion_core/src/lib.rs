//! # Lion Core
//!
//! Core types shared by the Lion permission engine.
//!
//! This crate defines the small vocabulary every other crate speaks:
//!
//! - Strongly typed identifiers for bundles
//! - The bundle identity handle handed to the engine by the framework
//! - The error hierarchy
//! - Logging and configuration utilities
//!
//! `lion_core` deliberately contains no policy logic. Permissions live in
//! `lion_permission` and conditional policy evaluation in `lion_policy`.

pub mod bundle;
pub mod error;
pub mod id;
pub mod utils;

// Re-export key items for convenience
pub use bundle::Bundle;
pub use error::{ConstructionError, Error, FormatError, PermissionError, PolicyError};
pub use id::{BundleId, Id};
pub use utils::{LogLevel, PolicyConfig};

/// A type alias for Result with our error types
pub type Result<T, E = error::Error> = std::result::Result<T, E>;

//! Utility functions and types.
//!
//! This module provides logging and configuration helpers used throughout
//! the system.

pub mod config;
pub mod logging;

pub use config::PolicyConfig;
pub use logging::LogLevel;

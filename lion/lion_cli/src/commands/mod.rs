//! Command modules for the Lion CLI
//!
//! - policy: Policy file management commands
//! - check: Permission decisions for a bundle

pub mod check;
pub mod policy;

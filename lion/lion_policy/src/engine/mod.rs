//! Permission resolution.
//!
//! This module answers permission queries for a bundle: per-bundle
//! conditional evaluation and the precedence combination of all sources.

pub mod combiner;
pub mod evaluation;

pub use combiner::{Decision, PermissionPrecedenceCombiner};
pub use evaluation::{ConditionEvaluationState, Evaluation, EvaluationStats};

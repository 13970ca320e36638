//! Runtime conditions.
//!
//! A condition is a boolean test bound to a bundle. Immutable conditions
//! never change their answer once evaluated; mutable ones may.

pub mod factory;
pub mod location;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub use factory::{ConditionFactory, ConditionProvider, ConditionRegistry};
pub use location::BundleLocationCondition;

/// A runtime predicate gating a policy entry.
pub trait Condition: fmt::Debug + Send + Sync {
    /// Evaluate the condition.
    fn is_satisfied(&self) -> bool;

    /// Whether a later evaluation may give a different answer.
    fn is_mutable(&self) -> bool;

    /// The answer of a condition decided when it was built, if any.
    fn fixed(&self) -> Option<bool> {
        None
    }
}

/// A condition whose answer is decided at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCondition {
    satisfied: bool,
}

impl FixedCondition {
    pub const TRUE: FixedCondition = FixedCondition { satisfied: true };
    pub const FALSE: FixedCondition = FixedCondition { satisfied: false };

    pub fn of(satisfied: bool) -> Self {
        if satisfied {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }
}

impl Condition for FixedCondition {
    fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    fn is_mutable(&self) -> bool {
        false
    }

    fn fixed(&self) -> Option<bool> {
        Some(self.satisfied)
    }
}

/// Evaluation state of a condition handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionState {
    Unevaluated,
    Satisfied,
    Unsatisfied,
}

/// A materialized condition with its last known answer.
#[derive(Debug, Clone)]
pub struct ConditionHandle {
    condition: Arc<dyn Condition>,
    state: ConditionState,
}

impl ConditionHandle {
    pub fn new(condition: Arc<dyn Condition>) -> Self {
        let state = match condition.fixed() {
            Some(true) => ConditionState::Satisfied,
            Some(false) => ConditionState::Unsatisfied,
            None => ConditionState::Unevaluated,
        };
        Self { condition, state }
    }

    /// The always-false, immutable handle substituted for conditions that
    /// could not be built.
    pub fn failed() -> Self {
        Self::new(Arc::new(FixedCondition::FALSE))
    }

    pub fn state(&self) -> ConditionState {
        self.state
    }

    pub fn is_mutable(&self) -> bool {
        self.condition.is_mutable()
    }

    /// Evaluated, satisfied and unable to change.
    pub fn is_proven(&self) -> bool {
        self.state == ConditionState::Satisfied && !self.is_mutable()
    }

    /// Evaluated, unsatisfied and unable to change.
    pub fn is_disproved(&self) -> bool {
        self.state == ConditionState::Unsatisfied && !self.is_mutable()
    }

    /// Evaluate the condition unless its answer is already final.
    ///
    /// A condition that panics becomes a permanently unsatisfied handle.
    pub fn evaluate(&mut self) -> bool {
        if self.state != ConditionState::Unevaluated && !self.is_mutable() {
            return self.state == ConditionState::Satisfied;
        }

        let condition = Arc::clone(&self.condition);
        match catch_unwind(AssertUnwindSafe(|| condition.is_satisfied())) {
            Ok(satisfied) => {
                self.state = if satisfied {
                    ConditionState::Satisfied
                } else {
                    ConditionState::Unsatisfied
                };
                satisfied
            }
            Err(_) => {
                tracing::warn!(condition = ?self.condition, "Condition panicked during evaluation");
                *self = Self::failed();
                false
            }
        }
    }
}

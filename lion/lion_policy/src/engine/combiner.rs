//! Precedence combination of the four permission sources.

use std::fmt;
use std::sync::Arc;

use lion_core::error::PermissionError;
use lion_permission::{Permission, PermissionSet};

use super::evaluation::ConditionEvaluationState;

/// Which source decided a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Granted by the baseline.
    Baseline,
    /// Denied by the ceiling.
    Restricted,
    /// Decided by a bundle-specific assignment.
    Assigned(bool),
    /// Decided by applicable conditional policy.
    Conditional(bool),
    /// No other source applied; decided by the default assignment.
    Fallback(bool),
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        match self {
            Self::Baseline => true,
            Self::Restricted => false,
            Self::Assigned(granted) | Self::Conditional(granted) | Self::Fallback(granted) => *granted,
        }
    }
}

/// A read-only view combining baseline, ceiling, assigned and conditional
/// permissions of one bundle.
///
/// First match wins:
///
/// 1. The baseline implies the permission: granted.
/// 2. A ceiling is bound and does not imply it: denied.
/// 3. A bundle-specific assignment is bound: its answer, exactly.
/// 4. Conditional policy has applicable entries: its answer.
/// 5. Otherwise the assignment's answer, or denied if none is bound.
pub struct PermissionPrecedenceCombiner {
    baseline: Arc<dyn PermissionSet>,
    ceiling: Option<Arc<dyn PermissionSet>>,
    assigned: Option<Arc<dyn PermissionSet>>,
    is_default: bool,
    conditional: Option<Arc<ConditionEvaluationState>>,
}

impl PermissionPrecedenceCombiner {
    pub fn new(baseline: Arc<dyn PermissionSet>) -> Self {
        Self {
            baseline,
            ceiling: None,
            assigned: None,
            is_default: true,
            conditional: None,
        }
    }

    pub fn with_ceiling(mut self, ceiling: Arc<dyn PermissionSet>) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Bind assigned permissions; `is_default` is false for a
    /// bundle-specific assignment.
    pub fn with_assigned(mut self, assigned: Arc<dyn PermissionSet>, is_default: bool) -> Self {
        self.assigned = Some(assigned);
        self.is_default = is_default;
        self
    }

    pub fn with_conditional(mut self, conditional: Arc<ConditionEvaluationState>) -> Self {
        self.conditional = Some(conditional);
        self
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// The evaluation state consulted at the conditional step.
    pub fn conditional(&self) -> Option<&Arc<ConditionEvaluationState>> {
        self.conditional.as_ref()
    }

    pub fn decide(&self, permission: &dyn Permission) -> Decision {
        if self.baseline.implies(permission) {
            return Decision::Baseline;
        }

        if let Some(ceiling) = &self.ceiling {
            if !ceiling.implies(permission) {
                return Decision::Restricted;
            }
        }

        if let (false, Some(assigned)) = (self.is_default, &self.assigned) {
            return Decision::Assigned(assigned.implies(permission));
        }

        if let Some(conditional) = &self.conditional {
            let evaluation = conditional.evaluate(permission);
            if !evaluation.structurally_empty {
                return Decision::Conditional(evaluation.granted);
            }
        }

        Decision::Fallback(
            self.assigned
                .as_ref()
                .map(|assigned| assigned.implies(permission))
                .unwrap_or(false),
        )
    }
}

impl PermissionSet for PermissionPrecedenceCombiner {
    fn implies(&self, permission: &dyn Permission) -> bool {
        let decision = self.decide(permission);
        tracing::trace!(
            permission_type = permission.permission_type(),
            name = permission.name(),
            actions = permission.actions(),
            ?decision,
            "Permission decision"
        );
        decision.is_granted()
    }

    fn add(&self, _permission: Arc<dyn Permission>) -> Result<(), PermissionError> {
        Err(PermissionError::ReadOnly)
    }

    fn elements(&self) -> Result<Vec<Arc<dyn Permission>>, PermissionError> {
        Err(PermissionError::EnumerationUnsupported(
            "effective permissions are only available through point queries".into(),
        ))
    }
}

impl fmt::Debug for PermissionPrecedenceCombiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionPrecedenceCombiner")
            .field("ceiling", &self.ceiling.is_some())
            .field("assigned", &self.assigned.is_some())
            .field("is_default", &self.is_default)
            .field("conditional", &self.conditional)
            .finish()
    }
}

//! The all-permission.

use std::any::Any;

use super::permission::Permission;

/// A permission that implies every other permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllPermission;

impl AllPermission {
    pub const TYPE: &'static str = "all";
}

impl Permission for AllPermission {
    fn permission_type(&self) -> &str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        ""
    }

    fn actions(&self) -> &str {
        ""
    }

    fn implies(&self, _other: &dyn Permission) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

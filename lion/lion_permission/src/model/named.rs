//! Named permission model.
//!
//! A named permission carries a hierarchical, dot separated name and an
//! optional set of actions. One implementation serves every type that only
//! needs name and action matching (`property`, `service`, `package`, ...).

use std::any::Any;
use std::collections::BTreeSet;

use lion_core::error::PermissionError;

use super::permission::{split_actions, Permission};

/// A typed permission with wildcard name matching and an action set.
#[derive(Debug, Clone)]
pub struct NamedPermission {
    permission_type: String,
    name: String,
    actions: BTreeSet<String>,
    all_actions: bool,
    canonical: String,
}

impl NamedPermission {
    /// Create a new named permission.
    ///
    /// `name` may be `*`, a trailing wildcard such as `org.example.*`, or an
    /// exact name. The action `*` stands for every action.
    pub fn new(
        permission_type: impl Into<String>,
        name: impl Into<String>,
        actions: &str,
    ) -> Result<Self, PermissionError> {
        let permission_type = permission_type.into();
        let name = name.into();
        if name.is_empty() {
            return Err(PermissionError::Invalid(format!(
                "{} permission requires a name",
                permission_type
            )));
        }
        if name.contains('*') && name != "*" && !name.ends_with(".*") {
            return Err(PermissionError::Invalid(format!(
                "wildcard must be trailing in '{}'",
                name
            )));
        }

        let actions: BTreeSet<String> = split_actions(actions).collect();
        let all_actions = actions.contains("*");
        let canonical = if all_actions {
            "*".to_string()
        } else {
            actions.iter().cloned().collect::<Vec<_>>().join(",")
        };

        Ok(Self {
            permission_type,
            name,
            actions,
            all_actions,
            canonical,
        })
    }

    fn name_covers(&self, other: &str) -> bool {
        if self.name == "*" {
            return true;
        }
        match self.name.strip_suffix('*') {
            Some(prefix) => other.starts_with(prefix) && other.len() > prefix.len(),
            None => self.name == other,
        }
    }

    fn actions_cover(&self, other: &NamedPermission) -> bool {
        if self.all_actions {
            return true;
        }
        !other.all_actions && other.actions.is_subset(&self.actions)
    }
}

impl Permission for NamedPermission {
    fn permission_type(&self) -> &str {
        &self.permission_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &str {
        &self.canonical
    }

    fn implies(&self, other: &dyn Permission) -> bool {
        match other.as_any().downcast_ref::<NamedPermission>() {
            Some(other) => {
                other.permission_type == self.permission_type
                    && self.name_covers(&other.name)
                    && self.actions_cover(other)
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

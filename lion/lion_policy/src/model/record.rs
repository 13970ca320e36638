//! Policy records.
//!
//! Records are the immutable parsed fragments an entry is built from. They
//! carry only text; conditions and permissions are materialized from them
//! on demand.

use std::fmt;
use std::str::FromStr;

use lion_core::error::FormatError;

use super::encoding::{write_quoted, Parser};

/// A condition fragment: `[type "arg" ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionRecord {
    condition_type: String,
    args: Vec<String>,
}

impl ConditionRecord {
    pub fn new(condition_type: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            args,
        }
    }

    pub fn condition_type(&self) -> &str {
        &self.condition_type
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn encode_into(&self, out: &mut String) {
        out.push('[');
        out.push_str(&self.condition_type);
        for arg in &self.args {
            out.push(' ');
            write_quoted(out, arg);
        }
        out.push(']');
    }
}

impl fmt::Display for ConditionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.encode_into(&mut out);
        f.write_str(&out)
    }
}

impl FromStr for ConditionRecord {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s.trim_start());
        let record = parser.parse_condition()?;
        parser.finish()?;
        Ok(record)
    }
}

/// A permission fragment: `(type "name" "actions")`.
///
/// Name and actions may be empty. Empty trailing fields are left out of the
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionRecord {
    permission_type: String,
    name: String,
    actions: String,
}

impl PermissionRecord {
    pub fn new(
        permission_type: impl Into<String>,
        name: impl Into<String>,
        actions: impl Into<String>,
    ) -> Self {
        Self {
            permission_type: permission_type.into(),
            name: name.into(),
            actions: actions.into(),
        }
    }

    pub fn permission_type(&self) -> &str {
        &self.permission_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &str {
        &self.actions
    }

    /// Copy of this record with a different name.
    pub(crate) fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            permission_type: self.permission_type.clone(),
            name: name.into(),
            actions: self.actions.clone(),
        }
    }

    pub(crate) fn encode_into(&self, out: &mut String) {
        out.push('(');
        out.push_str(&self.permission_type);
        if !self.name.is_empty() || !self.actions.is_empty() {
            out.push(' ');
            write_quoted(out, &self.name);
        }
        if !self.actions.is_empty() {
            out.push(' ');
            write_quoted(out, &self.actions);
        }
        out.push(')');
    }
}

impl fmt::Display for PermissionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.encode_into(&mut out);
        f.write_str(&out)
    }
}

impl FromStr for PermissionRecord {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s.trim_start());
        let record = parser.parse_permission()?;
        parser.finish()?;
        Ok(record)
    }
}

/// One item of an entry, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyItem {
    Condition(ConditionRecord),
    Permission(PermissionRecord),
}

impl PolicyItem {
    pub(crate) fn encode_into(&self, out: &mut String) {
        match self {
            Self::Condition(record) => record.encode_into(out),
            Self::Permission(record) => record.encode_into(out),
        }
    }
}

impl From<ConditionRecord> for PolicyItem {
    fn from(record: ConditionRecord) -> Self {
        Self::Condition(record)
    }
}

impl From<PermissionRecord> for PolicyItem {
    fn from(record: PermissionRecord) -> Self {
        Self::Permission(record)
    }
}

/// Parse a list of encoded permission records, as found in configuration.
pub fn parse_permission_records<S: AsRef<str>>(
    encoded: &[S],
) -> Result<Vec<PermissionRecord>, FormatError> {
    encoded.iter().map(|s| s.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_record_encoding() {
        assert_eq!(PermissionRecord::new("file", "/tmp", "read").to_string(), r#"(file "/tmp" "read")"#);
        assert_eq!(PermissionRecord::new("runtime", "exit", "").to_string(), r#"(runtime "exit")"#);
        assert_eq!(PermissionRecord::new("all", "", "").to_string(), "(all)");
        assert_eq!(PermissionRecord::new("x", "", "a").to_string(), r#"(x "" "a")"#);
    }

    #[test]
    fn test_condition_record_encoding() {
        let record = ConditionRecord::new("location", vec!["file:*".into(), "!".into()]);
        assert_eq!(record.to_string(), r#"[location "file:*" "!"]"#);
        assert_eq!(ConditionRecord::new("always", vec![]).to_string(), "[always]");
    }

    #[test]
    fn test_parse_standalone_records() {
        let permission: PermissionRecord = r#" ( property "a.*"  "read" ) "#.parse().unwrap();
        assert_eq!(permission, PermissionRecord::new("property", "a.*", "read"));

        let condition: ConditionRecord = r#"[location "x"]"#.parse().unwrap();
        assert_eq!(condition.condition_type(), "location");
        assert_eq!(condition.args(), &["x".to_string()]);

        assert!("(all) (all)".parse::<PermissionRecord>().is_err());
        assert!("[location".parse::<ConditionRecord>().is_err());
    }

    #[test]
    fn test_parse_permission_records() {
        let records = parse_permission_records(&["(all)", r#"(file "-" "read")"#]).unwrap();
        assert_eq!(records.len(), 2);
        assert!(parse_permission_records(&["(all"]).is_err());
    }
}

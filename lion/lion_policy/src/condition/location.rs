//! Bundle location condition.

use std::sync::Arc;

use lion_core::error::ConstructionError;
use lion_core::Bundle;
use regex::Regex;

use super::{Condition, FixedCondition};

/// Matches a bundle's install location against a `*` wildcard pattern.
///
/// Arguments are `[pattern]` or `[pattern, "!"]`; the second form negates
/// the match. The answer is known as soon as the bundle is, so the provider
/// returns a fixed condition.
#[derive(Debug, Clone)]
pub struct BundleLocationCondition {
    pattern: Regex,
    negate: bool,
}

impl BundleLocationCondition {
    pub const TYPE: &'static str = "location";

    pub fn new(pattern: &str, negate: bool) -> Result<Self, ConstructionError> {
        let escaped: Vec<String> = pattern.split('*').map(|part| regex::escape(part)).collect();
        let source = format!("^{}$", escaped.join(".*"));
        let pattern = Regex::new(&source).map_err(|e| ConstructionError::failed(Self::TYPE, e.to_string()))?;
        Ok(Self { pattern, negate })
    }

    pub fn matches(&self, location: &str) -> bool {
        self.pattern.is_match(location) != self.negate
    }

    /// Provider entry point.
    pub fn get_condition(bundle: &Bundle, args: &[String]) -> Result<Arc<dyn Condition>, ConstructionError> {
        let negate = match args {
            [_] => false,
            [_, flag] if flag == "!" => true,
            [_, flag] => {
                return Err(ConstructionError::failed(
                    Self::TYPE,
                    format!("unexpected flag {:?}", flag),
                ))
            }
            _ => {
                return Err(ConstructionError::failed(
                    Self::TYPE,
                    format!("expected 1 or 2 arguments, got {}", args.len()),
                ))
            }
        };
        let condition = Self::new(&args[0], negate)?;
        Ok(Arc::new(FixedCondition::of(condition.matches(bundle.location()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_wildcard_matching() {
        let condition = BundleLocationCondition::new("file:/opt/*.jar", false).unwrap();
        assert!(condition.matches("file:/opt/a.jar"));
        assert!(condition.matches("file:/opt/sub/b.jar"));
        assert!(!condition.matches("http://opt/a.jar"));

        let literal = BundleLocationCondition::new("file:/a+b.jar", false).unwrap();
        assert!(literal.matches("file:/a+b.jar"));
        assert!(!literal.matches("file:/aab.jar"));
    }

    #[test]
    fn test_negation() {
        let bundle = Bundle::new("file:/opt/a.jar");
        let hit = BundleLocationCondition::get_condition(&bundle, &args(&["file:/opt/*"])).unwrap();
        assert_eq!(hit.fixed(), Some(true));
        let negated = BundleLocationCondition::get_condition(&bundle, &args(&["file:/opt/*", "!"])).unwrap();
        assert_eq!(negated.fixed(), Some(false));
    }

    #[test]
    fn test_bad_arguments() {
        let bundle = Bundle::new("file:/opt/a.jar");
        assert!(BundleLocationCondition::get_condition(&bundle, &[]).is_err());
        assert!(BundleLocationCondition::get_condition(&bundle, &args(&["*", "?"])).is_err());
        assert!(BundleLocationCondition::get_condition(&bundle, &args(&["*", "!", "x"])).is_err());
    }
}

//! Configuration utilities.
//!
//! Policy sources are configured from a TOML document. Permission lists are
//! kept in their canonical encoded form here; `lion_policy` parses them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::utils::logging::LogLevel;

/// Configuration of the permission engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Log level used by front ends.
    pub log_level: LogLevel,

    /// File holding the conditional policy, one encoded entry per line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<PathBuf>,

    /// Root of the per-bundle private data directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_area: Option<PathBuf>,

    /// Permissions granted to every bundle.
    pub implied: Vec<String>,

    /// Upper bound on everything except the implied permissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted: Option<Vec<String>>,

    /// Assigned permissions for bundles without a location override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_permissions: Option<Vec<String>>,

    /// Assigned permissions keyed by bundle location.
    pub locations: BTreeMap<String, Vec<String>>,
}

impl PolicyConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    ///
    /// Relative `storage` and `data_area` paths are resolved against the
    /// directory containing the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        if let Some(base) = path.parent() {
            config.storage = config.storage.map(|p| resolve(base, p));
            config.data_area = config.data_area.map(|p| resolve(base, p));
        }

        tracing::debug!(path = %path.display(), "Loaded policy configuration");
        Ok(config)
    }

    /// Render the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level = "debug"
storage = "conditional.policy"
data_area = "/var/lib/lion"
implied = ['(file "-" "read,write,delete")']
restricted = ['(property "*" "read")']

[locations]
"file:/opt/admin.jar" = ['(all)']
"#;

    #[test]
    fn test_parse_config() {
        let config = PolicyConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.implied.len(), 1);
        assert_eq!(config.restricted.as_ref().map(Vec::len), Some(1));
        assert!(config.default_permissions.is_none());
        assert_eq!(config.locations["file:/opt/admin.jar"], vec!["(all)".to_string()]);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = PolicyConfig::from_toml_str("").unwrap();
        assert_eq!(config, PolicyConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(PolicyConfig::from_toml_str("colour = \"blue\"").is_err());
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lion.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = PolicyConfig::from_file(&path).unwrap();
        assert_eq!(config.storage, Some(dir.path().join("conditional.policy")));
        assert_eq!(config.data_area, Some(PathBuf::from("/var/lib/lion")));
    }

    #[test]
    fn test_round_trip_toml() {
        let config = PolicyConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PolicyConfig::from_toml_str(&text).unwrap(), config);
    }
}

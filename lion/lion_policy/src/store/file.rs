//! File-backed policy storage.
//!
//! One encoded entry per line. Blank lines and lines starting with `#` are
//! ignored on load and dropped on the next save.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use lion_core::error::PolicyError;

use super::PolicyStorage;

/// Policy storage in a plain text file.
#[derive(Debug, Clone)]
pub struct FilePolicyStorage {
    path: PathBuf,
}

impl FilePolicyStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling the next save is written to, `<file name>.tmp`.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> PolicyError {
    PolicyError::Storage(format!("{}: {}", path.display(), err))
}

impl PolicyStorage for FilePolicyStorage {
    fn load(&self) -> Result<Vec<String>, PolicyError> {
        // A missing file is an empty policy
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "Policy file does not exist yet");
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path).map_err(|e| storage_error(&self.path, e))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }

    fn save(&self, encoded: &[String]) -> Result<(), PolicyError> {
        if let Some(bad) = encoded.iter().find(|e| e.contains('\n') || e.contains('\r')) {
            return Err(PolicyError::Storage(format!(
                "entry cannot be stored on one line: {:?}",
                bad
            )));
        }

        // Write next to the target, then rename over it
        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).map_err(|e| storage_error(&tmp, e))?;
        for line in encoded {
            writeln!(file, "{}", line).map_err(|e| storage_error(&tmp, e))?;
        }
        file.sync_all().map_err(|e| storage_error(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| storage_error(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), entries = encoded.len(), "Saved policy");
        Ok(())
    }
}

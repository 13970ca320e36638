//! File permission model.
//!
//! This module defines permissions for file access. Path matching is purely
//! lexical: permission checks sit on hot paths and never touch the
//! filesystem.

use std::any::Any;
use std::path::{Component, Path, PathBuf};

use lion_core::error::PermissionError;

use super::permission::{split_actions, Permission};

/// Reserved name matching every file.
pub const ALL_FILES: &str = "<<ALL FILES>>";

const READ: u8 = 0b0001;
const WRITE: u8 = 0b0010;
const EXECUTE: u8 = 0b0100;
const DELETE: u8 = 0b1000;

/// What a file permission's name covers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileTarget {
    /// `<<ALL FILES>>`
    AllFiles,
    /// A single file or directory.
    Exact(PathBuf),
    /// `dir/*`: the direct children of a directory.
    Children(PathBuf),
    /// `dir/-`: everything below a directory.
    Recursive(PathBuf),
}

/// A permission that grants access to files.
#[derive(Debug, Clone)]
pub struct FilePermission {
    /// The name as given, used for display and encoding.
    name: String,

    /// The parsed target.
    target: FileTarget,

    /// Bit set of allowed actions.
    mask: u8,

    /// Canonical action list.
    actions: String,
}

impl FilePermission {
    pub const TYPE: &'static str = "file";

    /// Create a new file permission.
    ///
    /// # Arguments
    ///
    /// * `name` - A path, `dir/*`, `dir/-` or `<<ALL FILES>>`.
    /// * `actions` - Comma separated subset of `read,write,execute,delete`.
    ///
    /// # Returns
    ///
    /// The permission, or `PermissionError::Invalid` for an empty name, an
    /// empty action list or an unknown action.
    pub fn new(name: impl Into<String>, actions: &str) -> Result<Self, PermissionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PermissionError::Invalid("file permission requires a path".into()));
        }

        let mut mask = 0;
        for action in split_actions(actions) {
            mask |= match action.as_str() {
                "read" => READ,
                "write" => WRITE,
                "execute" => EXECUTE,
                "delete" => DELETE,
                other => {
                    return Err(PermissionError::Invalid(format!(
                        "unknown file action '{}'",
                        other
                    )))
                }
            };
        }
        if mask == 0 {
            return Err(PermissionError::Invalid("file permission requires actions".into()));
        }

        Ok(Self {
            target: parse_target(&name),
            name,
            mask,
            actions: canonical_actions(mask),
        })
    }

    /// Create a new read-only file permission.
    pub fn read_only(name: impl Into<String>) -> Result<Self, PermissionError> {
        Self::new(name, "read")
    }

    /// Check if read operations are allowed.
    pub fn can_read(&self) -> bool {
        self.mask & READ != 0
    }

    /// Check if write operations are allowed.
    pub fn can_write(&self) -> bool {
        self.mask & WRITE != 0
    }

    fn covers(&self, other: &FileTarget) -> bool {
        match (&self.target, other) {
            (FileTarget::AllFiles, _) => true,
            (_, FileTarget::AllFiles) => false,
            (FileTarget::Exact(mine), FileTarget::Exact(theirs)) => mine == theirs,
            (FileTarget::Exact(_), _) => false,
            (FileTarget::Children(dir), FileTarget::Exact(path)) => {
                path.parent() == Some(dir.as_path()) && path != dir
            }
            (FileTarget::Children(dir), FileTarget::Children(theirs)) => dir == theirs,
            (FileTarget::Children(_), FileTarget::Recursive(_)) => false,
            (FileTarget::Recursive(dir), FileTarget::Exact(path)) => {
                path != dir && path.starts_with(dir)
            }
            (FileTarget::Recursive(dir), FileTarget::Children(theirs))
            | (FileTarget::Recursive(dir), FileTarget::Recursive(theirs)) => theirs.starts_with(dir),
        }
    }
}

impl Permission for FilePermission {
    fn permission_type(&self) -> &str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &str {
        &self.actions
    }

    fn implies(&self, other: &dyn Permission) -> bool {
        match other.as_any().downcast_ref::<FilePermission>() {
            Some(other) => other.mask & !self.mask == 0 && self.covers(&other.target),
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn parse_target(name: &str) -> FileTarget {
    if name == ALL_FILES {
        return FileTarget::AllFiles;
    }
    if name == "-" {
        return FileTarget::Recursive(PathBuf::new());
    }
    if name == "*" {
        return FileTarget::Children(PathBuf::new());
    }
    if let Some(dir) = name.strip_suffix("/-") {
        return FileTarget::Recursive(normalize(Path::new(dir)));
    }
    if let Some(dir) = name.strip_suffix("/*") {
        return FileTarget::Children(normalize(Path::new(dir)));
    }
    FileTarget::Exact(normalize(Path::new(name)))
}

/// Lexically normalize a path: drop `.` and fold `..` where possible.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn canonical_actions(mask: u8) -> String {
    [(READ, "read"), (WRITE, "write"), (EXECUTE, "execute"), (DELETE, "delete")]
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(",")
}

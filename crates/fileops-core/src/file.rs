//! File metadata returned by the filesystem layer.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Read-only metadata about a file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Full path.
    pub path: PathBuf,
    /// Final path component.
    pub name: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Permission bits.
    pub mode: u32,
}

impl FileInfo {
    /// Create metadata for a regular file.
    pub fn file(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
            size,
            modified,
            is_dir: false,
            mode: 0o644,
        }
    }

    /// Create metadata for a directory.
    pub fn directory(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
            size: 0,
            modified,
            is_dir: true,
            mode: 0o755,
        }
    }

    /// Set the permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Check if the name marks a hidden entry.
    pub fn is_hidden(&self) -> bool {
        is_hidden_name(&self.name)
    }
}

/// Get the final path component as a string, or the whole path for roots.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Check if a file name is hidden (leading dot, but not `.` or `..`).
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_info_constructors() {
        let info = FileInfo::file("/data/report.txt", 42, SystemTime::UNIX_EPOCH);
        assert_eq!(info.name, "report.txt");
        assert!(!info.is_dir);

        let dir = FileInfo::directory("/data/.cache", SystemTime::UNIX_EPOCH);
        assert!(dir.is_dir);
        assert!(dir.is_hidden());
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden_name(".git"));
        assert!(!is_hidden_name("."));
        assert!(!is_hidden_name(".."));
        assert!(!is_hidden_name("src"));
    }
}

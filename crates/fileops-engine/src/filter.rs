//! Path selection rules shared by the built-in operations.

use std::path::Path;

use fileops_core::{ConfigError, OperationConfig, file_name, is_hidden_name};
use fileops_fs::relative_depth;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Directory names cleanup never touches.
pub const SYSTEM_DIRECTORIES: [&str; 6] = [".git", ".svn", ".hg", "node_modules", "__pycache__", ".DS_Store"];

/// Compile glob patterns. `*` does not cross path separators.
pub(crate) fn glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.kind().to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

/// Decides which directories cleanup may remove.
#[derive(Debug, Clone)]
pub struct CleanupPolicy {
    exclude: GlobSet,
    exclude_fragments: Vec<String>,
    include: GlobSet,
}

impl CleanupPolicy {
    pub fn from_config(config: &OperationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            exclude: glob_set(&config.exclude_patterns)?,
            exclude_fragments: config
                .exclude_patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
            include: glob_set(&config.include_patterns)?,
        })
    }

    /// Check whether `dir` is protected from removal.
    ///
    /// A directory is excluded when its name matches an exclude glob, when
    /// an exclude pattern occurs anywhere in its path (ignoring case), when it
    /// is a version-control or tooling directory, or when it is hidden and
    /// its name matches no include glob.
    pub fn is_excluded(&self, dir: &Path) -> bool {
        let name = file_name(dir);
        if self.exclude.is_match(&name) {
            return true;
        }

        let lowered = dir.to_string_lossy().to_lowercase();
        if self.exclude_fragments.iter().any(|f| lowered.contains(f.as_str())) {
            return true;
        }

        if SYSTEM_DIRECTORIES.contains(&name.as_str()) {
            return true;
        }

        is_hidden_name(&name) && !self.include.is_match(&name)
    }
}

/// Selects the entries an ownership change applies to.
#[derive(Debug, Clone)]
pub struct PathFilter {
    exclude: GlobSet,
    include: GlobSet,
    recursive: bool,
}

impl PathFilter {
    pub fn from_config(config: &OperationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            exclude: glob_set(&config.exclude_patterns)?,
            include: glob_set(&config.include_patterns)?,
            recursive: config.recursive,
        })
    }

    /// Check whether `path`, found under `root`, is selected.
    pub fn accepts(&self, root: &Path, path: &Path) -> bool {
        let name = file_name(path);
        if self.exclude.is_match(path) || self.exclude.is_match(&name) {
            return false;
        }
        if !self.include.is_empty() && !self.include.is_match(&name) {
            return false;
        }
        self.recursive || relative_depth(root, path) <= 1
    }
}

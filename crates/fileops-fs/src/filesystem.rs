//! The filesystem collaborator trait.

use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use fileops_core::{FileInfo, HashAlgorithm, OperationConfig};

use crate::FsError;

/// Options controlling a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Follow symbolic links.
    pub follow_symlinks: bool,
    /// Maximum depth below the root (None = unlimited).
    pub max_depth: Option<usize>,
}

impl WalkOptions {
    /// Derive walk options from an operation config.
    pub fn from_config(config: &OperationConfig) -> Self {
        Self {
            follow_symlinks: config.follow_symlinks,
            max_depth: config.max_depth,
        }
    }
}

/// A single entry visited during a walk.
#[derive(Debug)]
pub struct WalkEntry {
    /// Path of the entry.
    pub path: PathBuf,
    /// Metadata, or the error that prevented reading it.
    pub info: Result<FileInfo, FsError>,
}

/// Depth of `path` below `root`, counted in path components.
pub fn relative_depth(root: &Path, path: &Path) -> usize {
    path.strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or(0)
}

/// Visitor invoked once per walked entry. `Break` aborts the walk.
pub type WalkVisitor<'a> = dyn FnMut(WalkEntry) -> ControlFlow<()> + 'a;

/// Abstraction over the filesystem primitives the operations consume.
///
/// Calls are synchronous; they are not cancellable once issued.
pub trait FileSystem: fmt::Debug + Send + Sync {
    /// Walk the tree rooted at `root`, parents before children.
    ///
    /// Per-entry failures are handed to the visitor and the walk continues.
    /// An error is returned only when the walk cannot start at all.
    fn walk(&self, root: &Path, options: WalkOptions, visit: &mut WalkVisitor<'_>) -> Result<(), FsError>;

    /// Read metadata for a path.
    fn stat(&self, path: &Path) -> Result<FileInfo, FsError>;

    /// Remove a file or an empty directory.
    fn remove(&self, path: &Path) -> Result<(), FsError>;

    /// Check whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check whether a directory has no entries.
    fn is_empty(&self, path: &Path) -> Result<bool, FsError>;

    /// Hash a file's content, returned as lowercase hex.
    fn compute_hash(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, FsError>;

    /// Change the owner (and optionally group) of a path.
    fn chown(&self, path: &Path, uid: u32, gid: Option<u32>) -> Result<(), FsError>;
}

/// Collect every successfully walked path, for callers that only need a listing.
pub fn list_paths(fs: &dyn FileSystem, root: &Path, options: WalkOptions) -> Result<Vec<PathBuf>, FsError> {
    let mut paths = Vec::new();
    fs.walk(root, options, &mut |entry| {
        if entry.info.is_ok() {
            paths.push(entry.path);
        }
        ControlFlow::Continue(())
    })?;
    Ok(paths)
}

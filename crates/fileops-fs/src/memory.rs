//! In-memory filesystem used to drive operations in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::SystemTime;

use fileops_core::{FileInfo, HashAlgorithm};

use crate::filesystem::{FileSystem, WalkEntry, WalkOptions, WalkVisitor, relative_depth};
use crate::hash::hash_bytes;
use crate::FsError;

#[derive(Debug, Default)]
struct Entries {
    infos: BTreeMap<PathBuf, FileInfo>,
    contents: BTreeMap<PathBuf, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Faults {
    remove: BTreeSet<PathBuf>,
    chown: BTreeSet<PathBuf>,
    walk: BTreeSet<PathBuf>,
}

/// A recorded ownership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChownCall {
    pub path: PathBuf,
    pub uid: u32,
    pub gid: Option<u32>,
}

/// Filesystem held entirely in memory.
///
/// Adding an entry creates its missing ancestors as directories. Removals and
/// ownership changes are recorded so callers can assert on side effects, and
/// failures can be injected per path.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    entries: RwLock<Entries>,
    faults: RwLock<Faults>,
    removed: Mutex<Vec<PathBuf>>,
    chowned: Mutex<Vec<ChownCall>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory (and any missing ancestors).
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        let path = path.as_ref();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        insert_ancestors(&mut entries, path);
        entries
            .infos
            .entry(path.to_path_buf())
            .or_insert_with(|| FileInfo::directory(path, SystemTime::now()));
        self
    }

    /// Add a file with the given content (and any missing ancestors).
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> &Self {
        let path = path.as_ref();
        let content = content.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        insert_ancestors(&mut entries, path);
        entries.infos.insert(
            path.to_path_buf(),
            FileInfo::file(path, content.len() as u64, SystemTime::now()),
        );
        entries.contents.insert(path.to_path_buf(), content);
        self
    }

    /// Make `remove` fail with permission denied for this path.
    pub fn fail_remove(&self, path: impl Into<PathBuf>) -> &Self {
        self.faults.write().unwrap_or_else(PoisonError::into_inner).remove.insert(path.into());
        self
    }

    /// Make `chown` fail with permission denied for this path.
    pub fn fail_chown(&self, path: impl Into<PathBuf>) -> &Self {
        self.faults.write().unwrap_or_else(PoisonError::into_inner).chown.insert(path.into());
        self
    }

    /// Report this path as unreadable when walked.
    pub fn fail_walk(&self, path: impl Into<PathBuf>) -> &Self {
        self.faults.write().unwrap_or_else(PoisonError::into_inner).walk.insert(path.into());
        self
    }

    /// Paths removed so far, in order.
    pub fn removed(&self) -> Vec<PathBuf> {
        self.removed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Ownership changes applied so far, in order.
    pub fn chowned(&self) -> Vec<ChownCall> {
        self.chowned.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn faulty(&self, select: impl Fn(&Faults) -> &BTreeSet<PathBuf>, path: &Path) -> bool {
        let faults = self.faults.read().unwrap_or_else(PoisonError::into_inner);
        select(&faults).contains(path)
    }
}

fn insert_ancestors(entries: &mut Entries, path: &Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        entries
            .infos
            .entry(ancestor.to_path_buf())
            .or_insert_with(|| FileInfo::directory(ancestor, SystemTime::now()));
    }
}

fn has_children(entries: &Entries, path: &Path) -> bool {
    entries
        .infos
        .range::<Path, _>((Bound::Excluded(path), Bound::Unbounded))
        .next()
        .is_some_and(|(next, _)| next.starts_with(path))
}

impl FileSystem for MemoryFileSystem {
    fn walk(&self, root: &Path, options: WalkOptions, visit: &mut WalkVisitor<'_>) -> Result<(), FsError> {
        // Snapshot first so the visitor may call back into this filesystem.
        let visited: Vec<FileInfo> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if !entries.infos.contains_key(root) {
                return Err(FsError::NotFound {
                    path: root.to_path_buf(),
                });
            }
            entries
                .infos
                .range::<Path, _>((Bound::Included(root), Bound::Unbounded))
                .take_while(|(path, _)| path.starts_with(root))
                .filter(|(path, _)| {
                    options
                        .max_depth
                        .is_none_or(|max| relative_depth(root, path) <= max)
                })
                .map(|(_, info)| info.clone())
                .collect()
        };

        for info in visited {
            let path = info.path.clone();
            let info = if self.faulty(|f| &f.walk, &path) {
                Err(FsError::Walk {
                    path: path.clone(),
                    message: "unreadable entry".to_string(),
                })
            } else {
                Ok(info)
            };
            if visit(WalkEntry { path, info }).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn stat(&self, path: &Path) -> Result<FileInfo, FsError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.infos.get(path).cloned().ok_or_else(|| FsError::NotFound {
            path: path.to_path_buf(),
        })
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        if self.faulty(|f| &f.remove, path) {
            return Err(FsError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.infos.contains_key(path) {
            return Err(FsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        if has_children(&entries, path) {
            return Err(FsError::DirectoryNotEmpty {
                path: path.to_path_buf(),
            });
        }
        entries.infos.remove(path);
        entries.contents.remove(path);
        drop(entries);

        self.removed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.infos.contains_key(path)
    }

    fn is_empty(&self, path: &Path) -> Result<bool, FsError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.infos.get(path) {
            Some(info) if info.is_dir => Ok(!has_children(&entries, path)),
            Some(_) => Err(FsError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            }),
            None => Err(FsError::NotFound {
                path: path.to_path_buf(),
            }),
        }
    }

    fn compute_hash(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, FsError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let content = entries.contents.get(path).ok_or_else(|| FsError::NotFound {
            path: path.to_path_buf(),
        })?;
        hash_bytes(algorithm, content)
    }

    fn chown(&self, path: &Path, uid: u32, gid: Option<u32>) -> Result<(), FsError> {
        if !self.exists(path) {
            return Err(FsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        if self.faulty(|f| &f.chown, path) {
            return Err(FsError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        self.chowned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ChownCall {
                path: path.to_path_buf(),
                uid,
                gid,
            });
        Ok(())
    }
}

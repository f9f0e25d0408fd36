//! Filesystem implementation backed by the operating system.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use jwalk::{Parallelism, WalkDir};

use fileops_core::{FileInfo, HashAlgorithm};

use crate::filesystem::{FileSystem, WalkEntry, WalkOptions, WalkVisitor};
use crate::hash::{ContentHasher, content_hasher};
use crate::FsError;

/// Default read buffer for hashing.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem backed by `std::fs`, with jwalk for parallel traversal.
#[derive(Debug, Clone)]
pub struct OsFileSystem {
    chunk_size: usize,
}

impl OsFileSystem {
    /// Create a new OS filesystem.
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a new OS filesystem with a custom hashing buffer size.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(4096),
        }
    }

    fn hash_file(&self, path: &Path, hasher: &mut dyn ContentHasher) -> Result<(), FsError> {
        let mut file = fs::File::open(path).map_err(|e| FsError::io(path, e))?;
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut buffer).map_err(|e| FsError::io(path, e))?;
            if n == 0 {
                return Ok(());
            }
            hasher.update(&buffer[..n]);
        }
    }
}

impl Default for OsFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for OsFileSystem {
    fn walk(&self, root: &Path, options: WalkOptions, visit: &mut WalkVisitor<'_>) -> Result<(), FsError> {
        fs::symlink_metadata(root).map_err(|e| FsError::io(root, e))?;

        let walker = WalkDir::new(root)
            .parallelism(Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            })
            .skip_hidden(false)
            .follow_links(options.follow_symlinks)
            .sort(true)
            .min_depth(0)
            .max_depth(options.max_depth.unwrap_or(usize::MAX));

        for entry_result in walker {
            let visited = match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    let info = entry
                        .metadata()
                        .map(|metadata| to_file_info(&path, &metadata))
                        .map_err(|err| FsError::Walk {
                            path: path.clone(),
                            message: err.to_string(),
                        });
                    WalkEntry { path, info }
                }
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_else(|| root.to_path_buf());
                    WalkEntry {
                        info: Err(FsError::Walk {
                            path: path.clone(),
                            message: err.to_string(),
                        }),
                        path,
                    }
                }
            };

            if visit(visited).is_break() {
                tracing::debug!(root = %root.display(), "walk aborted by visitor");
                break;
            }
        }

        Ok(())
    }

    fn stat(&self, path: &Path) -> Result<FileInfo, FsError> {
        let metadata = fs::metadata(path).map_err(|e| FsError::io(path, e))?;
        Ok(to_file_info(path, &metadata))
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| FsError::io(path, e))?;
        let result = if metadata.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| FsError::io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_empty(&self, path: &Path) -> Result<bool, FsError> {
        let mut entries = fs::read_dir(path).map_err(|e| FsError::io(path, e))?;
        Ok(entries.next().is_none())
    }

    fn compute_hash(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, FsError> {
        let mut hasher = content_hasher(algorithm)?;
        self.hash_file(path, hasher.as_mut())?;
        Ok(hasher.finish_hex())
    }

    #[cfg(unix)]
    fn chown(&self, path: &Path, uid: u32, gid: Option<u32>) -> Result<(), FsError> {
        crate::ownership::chown(path, uid, gid)
    }

    #[cfg(not(unix))]
    fn chown(&self, _path: &Path, _uid: u32, _gid: Option<u32>) -> Result<(), FsError> {
        Err(FsError::Unsupported { operation: "chown" })
    }
}

fn to_file_info(path: &Path, metadata: &fs::Metadata) -> FileInfo {
    let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
    let info = if metadata.is_dir() {
        FileInfo::directory(path, modified)
    } else {
        FileInfo::file(path, metadata.len(), modified)
    };
    info.with_mode(get_mode(metadata))
}

/// Get the permission bits from metadata.
#[cfg(unix)]
fn get_mode(metadata: &fs::Metadata) -> u32 {
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn get_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() { 0o444 } else { 0o644 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::list_paths;
    use std::ops::ControlFlow;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();
        fs::create_dir(root.join(".hidden")).unwrap();
        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world").unwrap();

        temp
    }

    #[test]
    fn test_walk_visits_hidden_and_parents_first() {
        let temp = create_test_tree();
        let fs = OsFileSystem::new();

        let paths = list_paths(&fs, temp.path(), WalkOptions::default()).unwrap();

        assert_eq!(paths[0], temp.path());
        assert!(paths.contains(&temp.path().join(".hidden")));
        let dir1 = paths.iter().position(|p| p == &temp.path().join("dir1")).unwrap();
        let file2 = paths.iter().position(|p| p == &temp.path().join("dir1/file2.txt")).unwrap();
        assert!(dir1 < file2);
    }

    #[test]
    fn test_walk_respects_max_depth() {
        let temp = create_test_tree();
        let fs = OsFileSystem::new();
        let options = WalkOptions {
            max_depth: Some(1),
            ..Default::default()
        };

        let paths = list_paths(&fs, temp.path(), options).unwrap();
        assert!(!paths.contains(&temp.path().join("dir1/subdir")));
        assert!(paths.contains(&temp.path().join("dir1")));
    }

    #[test]
    fn test_walk_missing_root_fails() {
        let fs = OsFileSystem::new();
        let result = list_paths(&fs, Path::new("/no/such/root/here"), WalkOptions::default());
        assert!(matches!(result, Err(FsError::NotFound { .. })));
    }

    #[test]
    fn test_visitor_break_stops_walk() {
        let temp = create_test_tree();
        let fs = OsFileSystem::new();
        let mut seen = 0;

        fs.walk(temp.path(), WalkOptions::default(), &mut |_| {
            seen += 1;
            ControlFlow::Break(())
        })
        .unwrap();

        assert_eq!(seen, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_stat_reports_permission_bits() {
        let temp = create_test_tree();
        let fs = OsFileSystem::new();
        let file = temp.path().join("file1.txt");
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o600)).unwrap();

        let info = fs.stat(&file).unwrap();
        assert_eq!(info.mode & 0o777, 0o600);
        assert_eq!(info.size, 5);
        assert!(!info.is_dir);
        assert!(fs.stat(temp.path()).unwrap().is_dir);
    }

    #[test]
    fn test_remove_and_is_empty() {
        let temp = create_test_tree();
        let fs = OsFileSystem::new();
        let subdir = temp.path().join("dir1/subdir");

        assert!(fs.is_empty(&subdir).unwrap());
        assert!(!fs.is_empty(&temp.path().join("dir1")).unwrap());

        fs.remove(&subdir).unwrap();
        assert!(!fs.exists(&subdir));

        let err = fs.remove(&temp.path().join("dir1")).unwrap_err();
        assert!(matches!(err, FsError::DirectoryNotEmpty { .. } | FsError::Io { .. }));
    }

    #[test]
    fn test_compute_hash() {
        let temp = create_test_tree();
        let fs = OsFileSystem::new();
        let file = temp.path().join("file1.txt");

        let sha = fs.compute_hash(&file, HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            sha,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        let blake = fs.compute_hash(&file, HashAlgorithm::Blake3).unwrap();
        assert_eq!(blake.len(), 64);

        assert!(matches!(
            fs.compute_hash(&file, HashAlgorithm::Md5),
            Err(FsError::UnsupportedHash { .. })
        ));
    }

    #[test]
    fn test_stat() {
        let temp = create_test_tree();
        let fs = OsFileSystem::new();

        let info = fs.stat(&temp.path().join("file1.txt")).unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.name, "file1.txt");
        assert!(!info.is_dir);
    }
}

//! Empty-directory cleanup.

use std::collections::{BTreeMap, HashSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fileops_core::{ConfigError, Details, OperationConfig, OperationKind, OperationResult, OperationStatus};
use fileops_fs::{FileSystem, WalkOptions};
use tokio_util::sync::CancellationToken;

use crate::filter::CleanupPolicy;
use crate::operation::{BaseOperation, Operation};
use crate::{EngineError, OperationFactory};

const TOTAL_STEPS: usize = 4;

/// Check the configuration for a cleanup run.
pub fn validate_cleanup(config: &OperationConfig) -> Result<(), ConfigError> {
    config.validate()?;
    if config.paths.is_empty() {
        return Err(ConfigError::NoPaths);
    }
    Ok(())
}

/// Creates [`CleanupOperation`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupFactory;

impl OperationFactory for CleanupFactory {
    fn validate(&self, config: &OperationConfig) -> Result<(), ConfigError> {
        validate_cleanup(config)
    }

    fn create(
        &self,
        id: String,
        config: &OperationConfig,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Arc<dyn Operation>, EngineError> {
        Ok(Arc::new(CleanupOperation {
            base: BaseOperation::new(id, OperationKind::Cleanup, TOTAL_STEPS),
            policy: CleanupPolicy::from_config(config)?,
            fs,
        }))
    }
}

#[derive(Debug)]
struct Child {
    path: PathBuf,
    is_dir: bool,
}

/// Directory tree of one root, as seen by a single walk.
#[derive(Debug)]
struct ScannedRoot {
    children: BTreeMap<PathBuf, Vec<Child>>,
    unreadable: HashSet<PathBuf>,
    visited: usize,
}

/// Removes empty directories below each configured root.
///
/// Detection is bottom-up: a directory whose only children are themselves
/// removable directories is removable too, so nested empty chains go away in
/// one run. Roots are never removed.
#[derive(Debug)]
pub struct CleanupOperation {
    base: BaseOperation,
    policy: CleanupPolicy,
    fs: Arc<dyn FileSystem>,
}

impl CleanupOperation {
    fn scan(&self, ctx: &CancellationToken, root: &Path, options: WalkOptions) -> Result<ScannedRoot, EngineError> {
        let mut children: BTreeMap<PathBuf, Vec<Child>> = BTreeMap::new();
        let mut unreadable = HashSet::new();
        let mut visited = 0;
        let mut interrupted = None;

        self.fs.walk(root, options, &mut |entry| {
            if let Err(err) = self.base.check_context(ctx) {
                interrupted = Some(err);
                return ControlFlow::Break(());
            }

            let is_dir = match &entry.info {
                Ok(info) => info.is_dir,
                Err(err) => {
                    self.base
                        .add_error(Some(entry.path.clone()), format!("Error accessing {}: {err}", entry.path.display()));
                    // An unreadable entry keeps its parent from looking empty.
                    unreadable.insert(entry.path.clone());
                    false
                }
            };

            if entry.path != root
                && let Some(parent) = entry.path.parent()
            {
                children.entry(parent.to_path_buf()).or_default().push(Child {
                    path: entry.path.clone(),
                    is_dir,
                });
            }
            if is_dir {
                children.entry(entry.path).or_default();
            }

            visited += 1;
            self.base.increment_progress(1, 0);
            ControlFlow::Continue(())
        })?;

        match interrupted {
            Some(err) => Err(err),
            None => Ok(ScannedRoot {
                children,
                unreadable,
                visited,
            }),
        }
    }

    /// Removable directories of one root, deepest first. Directories in
    /// `roots` are never candidates.
    fn identify(
        &self,
        ctx: &CancellationToken,
        scanned: &ScannedRoot,
        roots: &HashSet<PathBuf>,
    ) -> Result<Vec<PathBuf>, EngineError> {
        let mut dirs: Vec<&PathBuf> = scanned.children.keys().collect();
        dirs.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });

        let mut removable: HashSet<&Path> = HashSet::new();
        let mut ordered = Vec::new();
        for dir in dirs {
            self.base.check_context(ctx)?;
            if roots.contains(dir) || scanned.unreadable.contains(dir) || self.policy.is_excluded(dir) {
                continue;
            }

            let children = &scanned.children[dir];
            let candidate = if children.is_empty() {
                self.fs.exists(dir) && self.fs.is_empty(dir).unwrap_or(false)
            } else {
                children
                    .iter()
                    .all(|child| child.is_dir && removable.contains(child.path.as_path()))
            };

            if candidate {
                removable.insert(dir.as_path());
                ordered.push(dir.clone());
            }
        }
        Ok(ordered)
    }

    fn remove(&self, dir: &Path) -> Result<(), String> {
        // Children removed earlier in this run must be gone by now.
        match self.fs.is_empty(dir) {
            Ok(true) => self
                .fs
                .remove(dir)
                .map_err(|err| format!("Failed to remove directory {}: {err}", dir.display())),
            Ok(false) => Err(format!("Directory {} is no longer empty", dir.display())),
            Err(err) => Err(format!("Failed to inspect directory {}: {err}", dir.display())),
        }
    }
}

impl Operation for CleanupOperation {
    fn base(&self) -> &BaseOperation {
        &self.base
    }

    fn validate(&self, config: &OperationConfig) -> Result<(), ConfigError> {
        validate_cleanup(config)
    }

    fn execute(&self, ctx: &CancellationToken, config: &OperationConfig) -> Result<OperationResult, EngineError> {
        let options = WalkOptions::from_config(config);
        let roots = protected_roots(&config.paths);

        self.base.update_step("Scanning directories");
        let mut scanned_roots = Vec::with_capacity(roots.len());
        for root in scan_roots(&roots) {
            self.base.check_context(ctx)?;
            scanned_roots.push(self.scan(ctx, root, options)?);
        }
        let scanned_entries: usize = scanned_roots.iter().map(|s| s.visited).sum();
        let total_directories: usize = scanned_roots.iter().map(|s| s.children.len()).sum();

        self.base.update_step("Identifying empty directories");
        let mut candidates = Vec::new();
        for scanned in &scanned_roots {
            candidates.extend(self.identify(ctx, scanned, &roots)?);
        }
        self.base.set_totals((scanned_entries + candidates.len()) as u64, 0);
        tracing::debug!(id = %self.base.id(), candidates = candidates.len(), "empty directories identified");

        self.base.update_step("Processing empty directories");
        let mut removed = Vec::new();
        let mut skipped = Vec::new();
        for dir in candidates {
            self.base.check_context(ctx)?;
            if config.dry_run {
                tracing::info!(path = %dir.display(), "would remove empty directory");
                removed.push(dir);
            } else {
                match self.remove(&dir) {
                    Ok(()) => {
                        tracing::info!(path = %dir.display(), "removed empty directory");
                        removed.push(dir);
                    }
                    Err(message) => {
                        self.base.add_error(Some(dir.clone()), message);
                        skipped.push(dir);
                    }
                }
            }
            self.base.increment_progress(1, 0);
        }

        self.base.update_step("Completing cleanup");
        let summary = if config.dry_run {
            format!(
                "Cleanup (dry run): {} directories would be removed, {} skipped",
                removed.len(),
                skipped.len()
            )
        } else {
            format!(
                "Cleanup completed: {} directories removed, {} skipped",
                removed.len(),
                skipped.len()
            )
        };

        let mut details = Details::new();
        details.insert("removed_directories".into(), path_list(&removed));
        details.insert("skipped_directories".into(), path_list(&skipped));
        details.insert("total_directories".into(), total_directories.into());
        details.insert("dry_run".into(), config.dry_run.into());

        let mut result = self.base.create_result(OperationStatus::Completed, summary, details);
        if !config.dry_run {
            result.files_affected = removed;
        }
        Ok(result)
    }
}

/// Configured roots with redundant components and duplicates dropped.
fn protected_roots(paths: &[PathBuf]) -> HashSet<PathBuf> {
    paths.iter().map(|p| p.components().collect()).collect()
}

/// Roots to walk, in order. A root below another root is covered by that
/// root's walk and is not walked again.
fn scan_roots(roots: &HashSet<PathBuf>) -> Vec<&PathBuf> {
    let mut ordered: Vec<&PathBuf> = roots
        .iter()
        .filter(|root| {
            !roots
                .iter()
                .any(|other| other != *root && root.starts_with(other))
        })
        .collect();
    ordered.sort();
    ordered
}

pub(crate) fn path_list(paths: &[PathBuf]) -> serde_json::Value {
    paths
        .iter()
        .map(|p| serde_json::Value::String(p.to_string_lossy().into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileops_fs::MemoryFileSystem;

    #[test]
    fn test_validate_requires_paths() {
        assert!(matches!(
            validate_cleanup(&OperationConfig::default()),
            Err(ConfigError::NoPaths)
        ));
        assert!(validate_cleanup(&OperationConfig::new(["/data"])).is_ok());
    }

    #[test]
    fn test_roots_are_normalized_and_nested_roots_not_rewalked() {
        let paths = vec![
            PathBuf::from("/r/"),
            PathBuf::from("/r"),
            PathBuf::from("/r/a"),
            PathBuf::from("/s"),
        ];
        let roots = protected_roots(&paths);

        assert_eq!(roots.len(), 3);
        assert!(roots.contains(Path::new("/r/a")));
        assert_eq!(scan_roots(&roots), vec![&PathBuf::from("/r"), &PathBuf::from("/s")]);
    }

    #[test]
    fn test_identify_orders_deepest_first() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_dir("/r/a/b/c").add_file("/r/keep/file.txt", "x");
        let config = OperationConfig::new(["/r"]);
        let cleanup = CleanupOperation {
            base: BaseOperation::new("cleanup-test", OperationKind::Cleanup, TOTAL_STEPS),
            policy: CleanupPolicy::from_config(&config).unwrap(),
            fs: fs.clone(),
        };

        let ctx = CancellationToken::new();
        let scanned = cleanup.scan(&ctx, Path::new("/r"), WalkOptions::default()).unwrap();
        let roots = protected_roots(&config.paths);
        let found = cleanup.identify(&ctx, &scanned, &roots).unwrap();

        assert_eq!(
            found,
            vec![
                PathBuf::from("/r/a/b/c"),
                PathBuf::from("/r/a/b"),
                PathBuf::from("/r/a"),
            ]
        );
    }

    #[test]
    fn test_unreadable_entry_blocks_parent() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_dir("/r/a/locked").fail_walk("/r/a/locked");
        let config = OperationConfig::new(["/r"]);
        let cleanup = CleanupOperation {
            base: BaseOperation::new("cleanup-test", OperationKind::Cleanup, TOTAL_STEPS),
            policy: CleanupPolicy::from_config(&config).unwrap(),
            fs: fs.clone(),
        };

        let ctx = CancellationToken::new();
        let scanned = cleanup.scan(&ctx, Path::new("/r"), WalkOptions::default()).unwrap();
        let roots = protected_roots(&config.paths);
        assert!(cleanup.identify(&ctx, &scanned, &roots).unwrap().is_empty());
    }
}

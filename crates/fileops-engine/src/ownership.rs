//! Ownership changes over a tree.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use fileops_core::{ConfigError, Details, OperationConfig, OperationKind, OperationResult, OperationStatus};
use fileops_fs::{FileSystem, WalkOptions};
use tokio_util::sync::CancellationToken;

use crate::cleanup::path_list;
use crate::filter::PathFilter;
use crate::operation::{BaseOperation, Operation};
use crate::{EngineError, OperationFactory};

const TOTAL_STEPS: usize = 3;

/// Items below this count report scan progress individually; later ones
/// report every `SCAN_REPORT_EVERY` items.
const SCAN_REPORT_EVERY: u64 = 100;

/// Numeric owner to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipTarget {
    pub uid: u32,
    pub gid: Option<u32>,
}

impl OwnershipTarget {
    /// Read the target from `custom_settings`.
    ///
    /// `target_user` is `UID` or `UID:GID`. Without it the effective user and
    /// group of this process are used. Explicit `uid` and `gid` settings take
    /// precedence over both.
    pub fn from_config(config: &OperationConfig) -> Result<Self, ConfigError> {
        let mut target = match config.setting("target_user") {
            Some(value) => Self::parse(value)?,
            None => fileops_fs::current_owner()
                .map(|(uid, gid)| Self { uid, gid: Some(gid) })
                .ok_or_else(|| ConfigError::missing_setting("target_user"))?,
        };

        if let Some(uid) = override_id(config, "uid")? {
            target.uid = uid;
        }
        if let Some(gid) = override_id(config, "gid")? {
            target.gid = Some(gid);
        }
        Ok(target)
    }

    fn parse(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let text = match value {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return Err(ConfigError::invalid_setting("target_user", "expected UID or UID:GID")),
        };

        let (uid_text, gid_text) = match text.split_once(':') {
            Some((uid, gid)) => (uid, Some(gid)),
            None => (text.as_str(), None),
        };
        Ok(Self {
            uid: parse_id("target_user", uid_text)?,
            gid: gid_text.map(|gid| parse_id("target_user", gid)).transpose()?,
        })
    }
}

fn parse_id(key: &str, text: &str) -> Result<u32, ConfigError> {
    text.trim()
        .parse()
        .map_err(|_| ConfigError::invalid_setting(key, format!("'{text}' is not a numeric id")))
}

fn override_id(config: &OperationConfig, key: &str) -> Result<Option<u32>, ConfigError> {
    if config.setting(key).is_none() {
        return Ok(None);
    }
    config
        .setting_u64(key)
        .and_then(|id| u32::try_from(id).ok())
        .map(Some)
        .ok_or_else(|| ConfigError::invalid_setting(key, "expected a numeric id"))
}

/// Check the configuration for an ownership change.
pub fn validate_ownership(config: &OperationConfig) -> Result<(), ConfigError> {
    config.validate()?;
    if config.paths.is_empty() {
        return Err(ConfigError::NoPaths);
    }
    OwnershipTarget::from_config(config)?;
    Ok(())
}

/// Creates [`OwnershipOperation`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipFactory;

impl OperationFactory for OwnershipFactory {
    fn validate(&self, config: &OperationConfig) -> Result<(), ConfigError> {
        validate_ownership(config)
    }

    fn create(
        &self,
        id: String,
        config: &OperationConfig,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Arc<dyn Operation>, EngineError> {
        Ok(Arc::new(OwnershipOperation {
            base: BaseOperation::new(id, OperationKind::Ownership, TOTAL_STEPS),
            target: OwnershipTarget::from_config(config)?,
            filter: PathFilter::from_config(config)?,
            fs,
        }))
    }
}

/// Changes the owner of every selected entry below each root.
#[derive(Debug)]
pub struct OwnershipOperation {
    base: BaseOperation,
    target: OwnershipTarget,
    filter: PathFilter,
    fs: Arc<dyn FileSystem>,
}

impl OwnershipOperation {
    fn scan(&self, ctx: &CancellationToken, config: &OperationConfig) -> Result<(Vec<PathBuf>, u64), EngineError> {
        let mut options = WalkOptions::from_config(config);
        if !config.recursive {
            options.max_depth = Some(options.max_depth.map_or(1, |depth| depth.min(1)));
        }

        let mut selected = Vec::new();
        let mut scanned = 0u64;
        for root in &config.paths {
            self.base.check_context(ctx)?;
            let mut interrupted = None;

            self.fs.walk(root, options, &mut |entry| {
                if let Err(err) = self.base.check_context(ctx) {
                    interrupted = Some(err);
                    return ControlFlow::Break(());
                }

                match entry.info {
                    Ok(_) if self.filter.accepts(root, &entry.path) => selected.push(entry.path),
                    Ok(_) => {}
                    Err(err) => self.base.add_error(
                        Some(entry.path.clone()),
                        format!("Error walking {}: {err}", entry.path.display()),
                    ),
                }

                scanned += 1;
                if scanned < SCAN_REPORT_EVERY || scanned % SCAN_REPORT_EVERY == 0 {
                    self.base.update_progress(scanned, 0);
                }
                ControlFlow::Continue(())
            })?;

            if let Some(err) = interrupted {
                return Err(err);
            }
        }
        Ok((selected, scanned))
    }
}

impl Operation for OwnershipOperation {
    fn base(&self) -> &BaseOperation {
        &self.base
    }

    fn validate(&self, config: &OperationConfig) -> Result<(), ConfigError> {
        validate_ownership(config)
    }

    fn execute(&self, ctx: &CancellationToken, config: &OperationConfig) -> Result<OperationResult, EngineError> {
        self.base.update_step("Scanning paths");
        let (to_process, scanned) = self.scan(ctx, config)?;
        let total = scanned + to_process.len() as u64;
        self.base.update_progress(scanned, total);

        self.base.update_step("Changing ownership");
        let OwnershipTarget { uid, gid } = self.target;
        let mut changed = Vec::new();
        let mut skipped = Vec::new();
        let mut failures = Vec::new();
        for (index, path) in to_process.into_iter().enumerate() {
            self.base.check_context(ctx)?;

            let outcome = if config.dry_run {
                Ok(())
            } else {
                self.fs.chown(&path, uid, gid)
            };
            match outcome {
                Ok(()) => changed.push(path),
                Err(err) => {
                    let message = format!("{}: {err}", path.display());
                    self.base.add_error(Some(path.clone()), message.clone());
                    failures.push(message);
                    skipped.push(path);
                }
            }

            self.base.update_progress(scanned + index as u64 + 1, total);
        }

        self.base.update_step("Finalizing");
        let mode = if config.dry_run { "dry run" } else { "completed" };
        let summary = format!(
            "Ownership change ({mode}): {} items changed, {} skipped, {} errors",
            changed.len(),
            skipped.len(),
            self.base.error_count(),
        );

        let mut details = Details::new();
        details.insert("changed_items".into(), path_list(&changed));
        details.insert("skipped_items".into(), path_list(&skipped));
        details.insert("errors".into(), failures.into());
        details.insert("target_uid".into(), uid.into());
        details.insert("target_gid".into(), gid.map_or(serde_json::Value::Null, Into::into));
        details.insert("dry_run".into(), config.dry_run.into());

        let mut result = self.base.create_result(OperationStatus::Completed, summary, details);
        if !config.dry_run {
            result.files_affected = changed;
        }
        Ok(result)
    }
}

//! Registered kinds whose file processing is not available yet.

use std::sync::Arc;

use fileops_core::{ConfigError, Details, OperationConfig, OperationKind, OperationResult, OperationStatus};
use fileops_fs::FileSystem;
use tokio_util::sync::CancellationToken;

use crate::operation::{BaseOperation, Operation};
use crate::{EngineError, OperationFactory};

/// Creates [`PlannedOperation`]s for one kind.
#[derive(Debug, Clone, Copy)]
pub struct PlannedFactory {
    kind: OperationKind,
}

impl PlannedFactory {
    pub fn new(kind: OperationKind) -> Self {
        Self { kind }
    }
}

impl OperationFactory for PlannedFactory {
    fn validate(&self, config: &OperationConfig) -> Result<(), ConfigError> {
        config.validate()
    }

    fn create(
        &self,
        id: String,
        _config: &OperationConfig,
        _fs: Arc<dyn FileSystem>,
    ) -> Result<Arc<dyn Operation>, EngineError> {
        Ok(Arc::new(PlannedOperation {
            base: BaseOperation::new(id, self.kind, 1),
        }))
    }
}

/// Validates its input and completes without examining any file.
#[derive(Debug)]
pub struct PlannedOperation {
    base: BaseOperation,
}

impl Operation for PlannedOperation {
    fn base(&self) -> &BaseOperation {
        &self.base
    }

    fn execute(&self, ctx: &CancellationToken, config: &OperationConfig) -> Result<OperationResult, EngineError> {
        self.base.check_context(ctx)?;
        self.base.update_step("Validating configuration");

        let summary = format!("{} is not available yet: no files were examined", self.base.kind());
        let mut details = Details::new();
        details.insert(
            "hash_algorithm".into(),
            config
                .hash_algorithm()?
                .map_or(serde_json::Value::Null, |a| a.to_string().into()),
        );
        details.insert("dry_run".into(), config.dry_run.into());
        details.insert("paths".into(), crate::cleanup::path_list(&config.paths));

        Ok(self.base.create_result(OperationStatus::Completed, summary, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileops_fs::MemoryFileSystem;

    #[test]
    fn test_completes_without_touching_files() {
        let fs = Arc::new(MemoryFileSystem::new());
        let config = OperationConfig {
            hash_algorithm: Some("blake3".into()),
            ..OperationConfig::new(["/data"])
        };
        let op = PlannedFactory::new(OperationKind::Deduplication)
            .create("deduplication-test".into(), &config, fs.clone())
            .unwrap();

        let result = op.execute(&CancellationToken::new(), &config).unwrap();
        assert_eq!(result.status, OperationStatus::Completed);
        assert!(result.summary.contains("no files were examined"));
        assert_eq!(result.details["hash_algorithm"], "blake3");
        assert_eq!(op.total_steps(), 1);
        assert!(fs.removed().is_empty());
    }
}

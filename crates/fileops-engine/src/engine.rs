//! Operation registry and synchronous execution.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use fileops_core::{ConfigError, OperationConfig, OperationKind, OperationResult};
use fileops_fs::FileSystem;
use fileops_progress::ProgressTracker;
use tokio_util::sync::CancellationToken;

use crate::cleanup::CleanupFactory;
use crate::operation::Operation;
use crate::ownership::OwnershipFactory;
use crate::planned::PlannedFactory;
use crate::EngineError;

/// Creates operations of one kind.
pub trait OperationFactory: Send + Sync {
    /// Reject a configuration before anything is created.
    fn validate(&self, config: &OperationConfig) -> Result<(), ConfigError>;

    /// Build an operation with the given id.
    fn create(
        &self,
        id: String,
        config: &OperationConfig,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Arc<dyn Operation>, EngineError>;
}

/// A validated operation that has an id but has not started.
#[derive(Debug)]
pub struct PreparedOperation {
    operation: Arc<dyn Operation>,
    config: OperationConfig,
}

impl PreparedOperation {
    pub fn id(&self) -> &str {
        self.operation.id()
    }

    pub fn operation(&self) -> &Arc<dyn Operation> {
        &self.operation
    }
}

/// Registry of operation factories plus the collaborators operations need.
pub struct Engine {
    factories: RwLock<HashMap<OperationKind, Arc<dyn OperationFactory>>>,
    fs: Arc<dyn FileSystem>,
    progress: Arc<ProgressTracker>,
    sequence: AtomicU64,
}

impl Engine {
    /// Create an engine with no operations registered.
    pub fn new(fs: Arc<dyn FileSystem>, progress: Arc<ProgressTracker>) -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            fs,
            progress,
            sequence: AtomicU64::new(0),
        }
    }

    /// Create an engine with the built-in operations registered.
    pub fn with_defaults(fs: Arc<dyn FileSystem>, progress: Arc<ProgressTracker>) -> Self {
        let engine = Self::new(fs, progress);
        engine.register_operation(OperationKind::Cleanup, CleanupFactory);
        engine.register_operation(OperationKind::Ownership, OwnershipFactory);
        engine.register_operation(
            OperationKind::Deduplication,
            PlannedFactory::new(OperationKind::Deduplication),
        );
        engine.register_operation(
            OperationKind::Consolidation,
            PlannedFactory::new(OperationKind::Consolidation),
        );
        engine
    }

    /// Install or replace the factory for `kind`.
    pub fn register_operation(&self, kind: OperationKind, factory: impl OperationFactory + 'static) {
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.insert(kind, Arc::new(factory)).is_some() {
            tracing::debug!(%kind, "replaced operation factory");
        }
    }

    /// Registered kinds, in a stable order.
    pub fn supported_operations(&self) -> Vec<OperationKind> {
        let mut kinds: Vec<OperationKind> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        kinds.sort();
        kinds
    }

    pub fn progress_tracker(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Look up, validate and create an operation without running it.
    pub fn prepare(&self, kind: OperationKind, config: OperationConfig) -> Result<PreparedOperation, EngineError> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .ok_or(EngineError::UnsupportedOperation { kind })?;

        factory.validate(&config)?;

        let id = self.next_id(kind);
        let operation = factory.create(id, &config, Arc::clone(&self.fs))?;
        Ok(PreparedOperation { operation, config })
    }

    /// Run a prepared operation on the calling thread.
    ///
    /// The tracker ends `Completed` on success, `Cancelled` on cancellation
    /// and `Failed` on any other error.
    pub fn run(&self, prepared: PreparedOperation, ctx: &CancellationToken) -> Result<OperationResult, EngineError> {
        let PreparedOperation { operation, config } = prepared;
        let id = operation.id().to_string();
        let kind = operation.kind();

        let tracker = self.progress.start_operation(&id, kind, operation.total_steps());
        operation.bind_tracker(Arc::clone(&tracker));
        tracing::info!(%id, %kind, paths = config.paths.len(), dry_run = config.dry_run, "operation started");

        match operation.execute(ctx, &config) {
            Ok(result) => {
                tracker.complete();
                tracing::info!(%id, %kind, summary = %result.summary, "operation completed");
                Ok(result)
            }
            Err(EngineError::Cancelled) => {
                tracker.cancel();
                tracing::info!(%id, %kind, "operation cancelled");
                Err(EngineError::Cancelled)
            }
            Err(err) => {
                tracker.fail(err.to_string());
                tracing::error!(%id, %kind, error = %err, "operation failed");
                Err(err)
            }
        }
    }

    /// Prepare and run an operation on the calling thread.
    pub fn execute_operation(
        &self,
        ctx: &CancellationToken,
        kind: OperationKind,
        config: OperationConfig,
    ) -> Result<OperationResult, EngineError> {
        let prepared = self.prepare(kind, config)?;
        self.run(prepared, ctx)
    }

    /// `<kind>-<YYYYMMDD-HHMMSS>-<seq>`; the sequence keeps ids unique within a second.
    fn next_id(&self, kind: OperationKind) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{kind}-{}-{seq}", Utc::now().format("%Y%m%d-%H%M%S"))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("operations", &self.supported_operations())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileops_fs::MemoryFileSystem;

    fn engine() -> Engine {
        Engine::with_defaults(Arc::new(MemoryFileSystem::new()), Arc::new(ProgressTracker::new()))
    }

    #[test]
    fn test_defaults_registered() {
        assert_eq!(
            engine().supported_operations(),
            vec![
                OperationKind::Cleanup,
                OperationKind::Deduplication,
                OperationKind::Consolidation,
                OperationKind::Ownership,
            ]
        );
    }

    #[test]
    fn test_ids_are_unique_and_formatted() {
        let engine = engine();
        let a = engine.next_id(OperationKind::Cleanup);
        let b = engine.next_id(OperationKind::Cleanup);

        assert_ne!(a, b);
        assert!(a.starts_with("cleanup-"));
        let parts: Vec<&str> = a.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
    }
}

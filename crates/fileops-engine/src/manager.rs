//! Background execution with a concurrency cap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use fileops_core::{EngineSettings, OperationConfig, OperationKind, OperationResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::operation::Operation;
use crate::{Engine, EngineError};

type ActiveMap = Arc<Mutex<HashMap<String, Arc<dyn Operation>>>>;

/// Runs operations on blocking workers, at most `max_concurrent` at a time.
///
/// Submissions over the limit are rejected, not queued.
#[derive(Debug)]
pub struct OperationManager {
    engine: Arc<Engine>,
    max_concurrent: usize,
    active: ActiveMap,
    handles: Mutex<HashMap<String, JoinHandle<Result<OperationResult, EngineError>>>>,
}

/// Drops the operation from the active set when its worker finishes, even
/// if it panicked.
struct ActiveGuard {
    id: String,
    active: ActiveMap,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl OperationManager {
    pub fn new(engine: Arc<Engine>, max_concurrent: usize) -> Self {
        Self {
            engine,
            max_concurrent: max_concurrent.max(1),
            active: Arc::new(Mutex::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(engine: Arc<Engine>, settings: &EngineSettings) -> Self {
        Self::new(engine, settings.max_concurrent)
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Validate and start an operation in the background, returning its id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit_operation(
        &self,
        ctx: CancellationToken,
        kind: OperationKind,
        config: OperationConfig,
    ) -> Result<String, EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| EngineError::Worker {
            message: err.to_string(),
        })?;

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.len() >= self.max_concurrent {
            tracing::warn!(%kind, limit = self.max_concurrent, "operation rejected");
            return Err(EngineError::ConcurrencyLimitExceeded {
                limit: self.max_concurrent,
            });
        }

        let prepared = self.engine.prepare(kind, config)?;
        let id = prepared.id().to_string();
        active.insert(id.clone(), Arc::clone(prepared.operation()));

        let engine = Arc::clone(&self.engine);
        let guard = ActiveGuard {
            id: id.clone(),
            active: Arc::clone(&self.active),
        };
        let handle = runtime.spawn_blocking(move || {
            let _guard = guard;
            engine.run(prepared, &ctx)
        });
        drop(active);

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|_, handle| !handle.is_finished());
        handles.insert(id.clone(), handle);
        drop(handles);
        tracing::debug!(%id, "operation submitted");
        Ok(id)
    }

    fn active_operation(&self, id: &str) -> Result<Arc<dyn Operation>, EngineError> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::OperationNotFound { id: id.to_string() })
    }

    pub fn cancel_operation(&self, id: &str) -> Result<(), EngineError> {
        self.active_operation(id)?.cancel();
        tracing::info!(id, "cancel requested");
        Ok(())
    }

    /// Pause a running operation. Returns false if it was not running.
    pub fn pause_operation(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.active_operation(id)?.pause())
    }

    /// Resume a paused operation. Returns false if it was not paused.
    pub fn resume_operation(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.active_operation(id)?.resume())
    }

    /// Ids of operations still in flight.
    pub fn active_operations(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Wait for a submitted operation and take its result.
    ///
    /// Each result can be taken once. Results nobody waited for are dropped
    /// at the next submission once their operation has finished; the final
    /// status stays available from the progress tracker.
    pub async fn wait(&self, id: &str) -> Result<OperationResult, EngineError> {
        let handle = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| EngineError::OperationNotFound { id: id.to_string() })?;

        handle.await.map_err(|err| EngineError::Worker {
            message: err.to_string(),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileops_fs::MemoryFileSystem;
    use fileops_progress::ProgressTracker;
    use std::time::Duration;

    async fn until_idle(manager: &OperationManager) {
        for _ in 0..400 {
            let finished = manager
                .handles
                .lock()
                .unwrap()
                .values()
                .all(|handle| handle.is_finished());
            if manager.active_operations().is_empty() && finished {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("operations did not finish");
    }

    #[tokio::test]
    async fn test_unwaited_results_do_not_accumulate() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_dir("/r");
        let engine = Engine::with_defaults(fs, Arc::new(ProgressTracker::new()));
        let manager = OperationManager::new(Arc::new(engine), 2);

        let mut ids = Vec::new();
        for _ in 0..10 {
            let id = manager
                .submit_operation(
                    CancellationToken::new(),
                    OperationKind::Cleanup,
                    OperationConfig::new(["/r"]),
                )
                .unwrap();
            ids.push(id);
            until_idle(&manager).await;
            assert_eq!(manager.handles.lock().unwrap().len(), 1);
        }

        let last = ids.pop().unwrap();
        assert!(manager.wait(&last).await.is_ok());
        assert!(matches!(
            manager.wait(&ids[0]).await,
            Err(EngineError::OperationNotFound { .. })
        ));
        assert_eq!(manager.engine().progress_tracker().get_all_progress().len(), 10);
    }
}

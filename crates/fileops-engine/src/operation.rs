//! The operation trait and the lifecycle state every operation shares.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use fileops_core::{
    ConfigError, Details, OperationConfig, OperationKind, OperationResult, OperationStatus, ProgressInfo,
};
use fileops_progress::OperationTracker;
use tokio_util::sync::CancellationToken;

use crate::EngineError;

/// A runnable maintenance task.
///
/// Operations are driven synchronously on a blocking worker. Control calls
/// (`cancel`, `pause`, `resume`) arrive from other threads, so all methods
/// take `&self`.
pub trait Operation: Send + Sync + fmt::Debug {
    /// Shared lifecycle state.
    fn base(&self) -> &BaseOperation;

    /// Run the operation to completion.
    fn execute(&self, ctx: &CancellationToken, config: &OperationConfig) -> Result<OperationResult, EngineError>;

    /// Check a configuration before running.
    fn validate(&self, config: &OperationConfig) -> Result<(), ConfigError> {
        config.validate()
    }

    /// Describe the expected scope before running.
    fn estimate_progress(&self, _config: &OperationConfig) -> ProgressInfo {
        ProgressInfo::pending(self.id(), self.kind(), self.total_steps())
    }

    fn id(&self) -> &str {
        self.base().id()
    }

    fn kind(&self) -> OperationKind {
        self.base().kind()
    }

    fn total_steps(&self) -> usize {
        self.base().total_steps()
    }

    fn bind_tracker(&self, tracker: Arc<OperationTracker>) {
        self.base().bind_tracker(tracker);
    }

    fn cancel(&self) {
        self.base().cancel();
    }

    fn pause(&self) -> bool {
        self.base().pause()
    }

    fn resume(&self) -> bool {
        self.base().resume()
    }
}

/// Lifecycle state shared by all operations: identity, the cancelled flag
/// and the bound tracker.
///
/// Progress helpers are no-ops until a tracker is bound.
pub struct BaseOperation {
    id: String,
    kind: OperationKind,
    total_steps: usize,
    created_at: DateTime<Utc>,
    cancelled: AtomicBool,
    tracker: OnceLock<Arc<OperationTracker>>,
}

impl BaseOperation {
    pub fn new(id: impl Into<String>, kind: OperationKind, total_steps: usize) -> Self {
        Self {
            id: id.into(),
            kind,
            total_steps,
            created_at: Utc::now(),
            cancelled: AtomicBool::new(false),
            tracker: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Attach the tracker. Only the first binding takes effect.
    pub fn bind_tracker(&self, tracker: Arc<OperationTracker>) {
        if self.tracker.set(tracker).is_err() {
            tracing::warn!(id = %self.id, "tracker already bound");
        }
    }

    pub fn tracker(&self) -> Option<&Arc<OperationTracker>> {
        self.tracker.get()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.tracker().is_some_and(|t| t.is_cancelled())
    }

    /// Check point between units of work.
    ///
    /// Fails with [`EngineError::Cancelled`] if the caller's token or this
    /// operation was cancelled. While paused, blocks until resumed or
    /// cancelled and then checks again.
    pub fn check_context(&self, ctx: &CancellationToken) -> Result<(), EngineError> {
        self.ensure_not_cancelled(ctx)?;
        if let Some(tracker) = self.tracker()
            && tracker.is_paused()
        {
            tracing::debug!(id = %self.id, "paused, waiting for resume");
            tracker.wait_for_resume(ctx);
            self.ensure_not_cancelled(ctx)?;
        }
        Ok(())
    }

    fn ensure_not_cancelled(&self, ctx: &CancellationToken) -> Result<(), EngineError> {
        if ctx.is_cancelled() || self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Set the cancelled flag and cancel the bound tracker.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(tracker) = self.tracker() {
            tracker.cancel();
        }
    }

    pub fn pause(&self) -> bool {
        self.tracker().is_some_and(|t| t.pause())
    }

    pub fn resume(&self) -> bool {
        self.tracker().is_some_and(|t| t.resume())
    }

    pub fn update_step(&self, name: &str) {
        tracing::debug!(id = %self.id, step = name, "step");
        if let Some(tracker) = self.tracker() {
            tracker.update_step(name);
        }
    }

    pub fn increment_progress(&self, items: u64, bytes: u64) {
        if let Some(tracker) = self.tracker() {
            tracker.increment_progress(items, bytes);
        }
    }

    pub fn update_progress(&self, items: u64, total_items: u64) {
        if let Some(tracker) = self.tracker() {
            tracker.update_progress(items, total_items, 0, 0);
        }
    }

    pub fn set_totals(&self, total_items: u64, total_bytes: u64) {
        if let Some(tracker) = self.tracker() {
            tracker.set_totals(total_items, total_bytes);
        }
    }

    pub fn set_detail(&self, key: &str, value: impl Into<serde_json::Value>) {
        if let Some(tracker) = self.tracker() {
            tracker.set_detail(key, value);
        }
    }

    /// Record a recoverable per-item error.
    pub fn add_error(&self, path: Option<PathBuf>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(id = %self.id, path = ?path, error = %message, "item failed");
        if let Some(tracker) = self.tracker() {
            tracker.add_error(path, message);
        }
    }

    pub fn error_count(&self) -> usize {
        self.tracker().map_or(0, |t| t.progress_info().error_count)
    }

    /// Build the terminal record, pulling counters and errors from the tracker.
    pub fn create_result(&self, status: OperationStatus, summary: impl Into<String>, details: Details) -> OperationResult {
        let tracker = self.tracker();
        let start_time = tracker.map_or(self.created_at, |t| t.progress_info().start_time);
        let end_time = Utc::now();
        OperationResult {
            id: self.id.clone(),
            kind: self.kind,
            status,
            start_time,
            end_time,
            duration: (end_time - start_time).to_std().unwrap_or_default(),
            items_processed: tracker.map_or(0, |t| t.items_processed()),
            bytes_processed: tracker.map_or(0, |t| t.bytes_processed()),
            files_affected: Vec::new(),
            summary: summary.into(),
            details,
            errors: tracker.map(|t| t.errors()).unwrap_or_default(),
            warnings: Vec::new(),
        }
    }
}

impl fmt::Debug for BaseOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseOperation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("cancelled", &self.is_cancelled())
            .field("tracked", &self.tracker.get().is_some())
            .finish()
    }
}

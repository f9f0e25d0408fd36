//! Progress state of a single operation.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fileops_core::{Details, OperationError, OperationKind, OperationStatus, ProgressInfo};
use tokio_util::sync::CancellationToken;

use crate::hub::SubscriberHub;
use crate::speed::{SpeedWindow, estimate_eta};

/// How often a paused waiter re-checks its state.
pub const RESUME_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct TrackerState {
    status: OperationStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    current_step: String,
    steps_completed: usize,
    total_steps: usize,
    items_processed: u64,
    total_items: u64,
    bytes_processed: u64,
    total_bytes: u64,
    window: SpeedWindow,
    details: Details,
    errors: Vec<OperationError>,
}

impl TrackerState {
    fn sample(&mut self) {
        self.window.push(Instant::now(), self.items_processed, self.bytes_processed);
    }

    fn finish(&mut self, status: OperationStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        true
    }
}

/// Mutable progress of exactly one operation.
///
/// Every mutation offers a fresh snapshot to subscribers. Once a terminal
/// status is reached it never changes.
#[derive(Debug)]
pub struct OperationTracker {
    id: String,
    kind: OperationKind,
    state: RwLock<TrackerState>,
    token: CancellationToken,
    resume_tx: SyncSender<()>,
    resume_rx: Mutex<Receiver<()>>,
    hub: Arc<SubscriberHub>,
}

impl OperationTracker {
    pub(crate) fn new(
        id: impl Into<String>,
        kind: OperationKind,
        total_steps: usize,
        speed_window: usize,
        hub: Arc<SubscriberHub>,
    ) -> Self {
        let (resume_tx, resume_rx) = mpsc::sync_channel(1);
        Self {
            id: id.into(),
            kind,
            state: RwLock::new(TrackerState {
                status: OperationStatus::Running,
                start_time: Utc::now(),
                end_time: None,
                current_step: "Initializing".to_string(),
                steps_completed: 0,
                total_steps,
                items_processed: 0,
                total_items: 0,
                bytes_processed: 0,
                total_bytes: 0,
                window: SpeedWindow::new(speed_window),
                details: Details::new(),
                errors: Vec::new(),
            }),
            token: CancellationToken::new(),
            resume_tx,
            resume_rx: Mutex::new(resume_rx),
            hub,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn status(&self) -> OperationStatus {
        self.read(|s| s.status)
    }

    pub fn is_paused(&self) -> bool {
        self.status() == OperationStatus::Paused
    }

    /// Token cancelled when this tracker is cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn items_processed(&self) -> u64 {
        self.read(|s| s.items_processed)
    }

    pub fn bytes_processed(&self) -> u64 {
        self.read(|s| s.bytes_processed)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.read(|s| s.end_time)
    }

    /// Errors recorded so far, oldest first.
    pub fn errors(&self) -> Vec<OperationError> {
        self.read(|s| s.errors.clone())
    }

    /// Enter a new phase.
    pub fn update_step(&self, name: impl Into<String>) {
        self.mutate(|s| {
            s.current_step = name.into();
            s.steps_completed += 1;
        });
    }

    /// Set absolute counters and totals.
    pub fn update_progress(&self, items: u64, total_items: u64, bytes: u64, total_bytes: u64) {
        self.mutate(|s| {
            s.items_processed = items;
            s.total_items = total_items;
            s.bytes_processed = bytes;
            s.total_bytes = total_bytes;
            s.sample();
        });
    }

    /// Add to the counters.
    pub fn increment_progress(&self, items: u64, bytes: u64) {
        self.mutate(|s| {
            s.items_processed = s.items_processed.saturating_add(items);
            s.bytes_processed = s.bytes_processed.saturating_add(bytes);
            s.sample();
        });
    }

    pub fn set_totals(&self, total_items: u64, total_bytes: u64) {
        self.mutate(|s| {
            s.total_items = total_items;
            s.total_bytes = total_bytes;
        });
    }

    pub fn set_detail(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.mutate(|s| {
            s.details.insert(key.into(), value.into());
        });
    }

    /// Record a recoverable error. The status is unchanged.
    pub fn add_error(&self, path: Option<PathBuf>, message: impl Into<String>) {
        let error = OperationError::new(self.kind, path, message, true);
        self.mutate(|s| s.errors.push(error));
    }

    /// Mark completed. Returns false if already terminal.
    pub fn complete(&self) -> bool {
        self.transition(|s| s.finish(OperationStatus::Completed))
    }

    /// Mark failed with a non-recoverable error. Returns false if already terminal.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let error = OperationError::new(self.kind, None, message, false);
        self.transition(|s| {
            let changed = s.finish(OperationStatus::Failed);
            if changed {
                s.errors.push(error);
            }
            changed
        })
    }

    /// Mark cancelled, cancel the tracker token and wake a paused waiter.
    /// Returns false if already terminal.
    pub fn cancel(&self) -> bool {
        let changed = self.transition(|s| s.finish(OperationStatus::Cancelled));
        self.token.cancel();
        let _ = self.resume_tx.try_send(());
        changed
    }

    /// Pause a running operation. No-op otherwise.
    pub fn pause(&self) -> bool {
        self.transition(|s| {
            if s.status != OperationStatus::Running {
                return false;
            }
            s.status = OperationStatus::Paused;
            true
        })
    }

    /// Resume a paused operation. No-op otherwise.
    pub fn resume(&self) -> bool {
        let changed = self.transition(|s| {
            if s.status != OperationStatus::Paused {
                return false;
            }
            s.status = OperationStatus::Running;
            true
        });
        if changed {
            // At most one pending signal; a second while pending is dropped.
            let _ = self.resume_tx.try_send(());
        }
        changed
    }

    /// Block while paused, until resumed or cancelled.
    ///
    /// `external` is polled on every tick so a caller-side cancellation also
    /// releases the wait.
    pub fn wait_for_resume(&self, external: &CancellationToken) {
        let resume_rx = self.resume_rx.lock().unwrap_or_else(PoisonError::into_inner);
        while self.is_paused() && !self.is_cancelled() && !external.is_cancelled() {
            match resume_rx.recv_timeout(RESUME_POLL_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// Build an immutable snapshot. Speed and ETA are computed now.
    pub fn progress_info(&self) -> ProgressInfo {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let speed = state.window.items_per_second();
        ProgressInfo {
            id: self.id.clone(),
            kind: self.kind,
            status: state.status,
            start_time: state.start_time,
            end_time: state.end_time,
            current_step: state.current_step.clone(),
            steps_completed: state.steps_completed,
            total_steps: state.total_steps,
            items_processed: state.items_processed,
            total_items: state.total_items,
            bytes_processed: state.bytes_processed,
            total_bytes: state.total_bytes,
            speed,
            eta: estimate_eta(state.items_processed, state.total_items, speed),
            error: state.errors.last().map(|e| e.message.clone()),
            error_count: state.errors.len(),
            details: state.details.clone(),
        }
    }

    /// Offer the current snapshot to subscribers, if there are any.
    pub fn publish(&self) {
        if self.hub.has_subscribers(&self.id) {
            self.hub.publish(&self.progress_info());
        }
    }

    fn read<T>(&self, f: impl FnOnce(&TrackerState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn mutate(&self, f: impl FnOnce(&mut TrackerState)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
        self.publish();
    }

    fn transition(&self, f: impl FnOnce(&mut TrackerState) -> bool) -> bool {
        let changed = f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
        if changed {
            self.publish();
        }
        changed
    }
}

//! Registry of per-operation trackers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use fileops_core::{EngineSettings, OperationKind, OperationStatus, ProgressInfo};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::hub::{DEFAULT_CAPACITY, SubscriberHub, WILDCARD};
use crate::speed::DEFAULT_WINDOW;
use crate::tracker::OperationTracker;

/// How long finished trackers stay queryable by default.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Counts of tracked operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub total_operations: usize,
    pub by_status: BTreeMap<OperationStatus, usize>,
    pub by_kind: BTreeMap<OperationKind, usize>,
}

/// Holds every live tracker and fans snapshots out to subscribers.
#[derive(Debug)]
pub struct ProgressTracker {
    trackers: RwLock<HashMap<String, Arc<OperationTracker>>>,
    hub: Arc<SubscriberHub>,
    speed_window: usize,
    retention: Duration,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_WINDOW)
    }

    /// Create a registry with the given default subscription buffer and speed window.
    pub fn with_capacity(subscriber_capacity: usize, speed_window: usize) -> Self {
        Self {
            trackers: RwLock::new(HashMap::new()),
            hub: Arc::new(SubscriberHub::new(subscriber_capacity)),
            speed_window,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Set how long finished trackers are kept by auto reporting.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::with_capacity(settings.subscriber_capacity, settings.speed_window).with_retention(settings.retention())
    }

    /// Create and register a running tracker, then broadcast its first snapshot.
    pub fn start_operation(&self, id: &str, kind: OperationKind, total_steps: usize) -> Arc<OperationTracker> {
        let tracker = Arc::new(OperationTracker::new(
            id,
            kind,
            total_steps,
            self.speed_window,
            Arc::clone(&self.hub),
        ));

        let previous = self
            .trackers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::clone(&tracker));
        if previous.is_some() {
            tracing::warn!(id, "replaced an existing tracker");
        }

        tracing::debug!(id, %kind, total_steps, "tracking operation");
        tracker.publish();
        tracker
    }

    pub fn get_operation(&self, id: &str) -> Option<Arc<OperationTracker>> {
        self.trackers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn get_progress(&self, id: &str) -> Option<ProgressInfo> {
        self.get_operation(id).map(|tracker| tracker.progress_info())
    }

    /// Snapshots of every tracked operation, oldest first.
    pub fn get_all_progress(&self) -> Vec<ProgressInfo> {
        let mut all: Vec<ProgressInfo> = self
            .snapshot_trackers()
            .iter()
            .map(|tracker| tracker.progress_info())
            .collect();
        all.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Subscribe to one operation with the default buffer size.
    pub fn subscribe(&self, id: &str) -> mpsc::Receiver<ProgressInfo> {
        self.hub.subscribe(id, self.hub.default_capacity())
    }

    /// Subscribe to every operation.
    pub fn subscribe_all(&self) -> mpsc::Receiver<ProgressInfo> {
        self.subscribe(WILDCARD)
    }

    pub fn subscribe_with_capacity(&self, id: &str, capacity: usize) -> mpsc::Receiver<ProgressInfo> {
        self.hub.subscribe(id, capacity)
    }

    /// Close every subscription for `id`.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.hub.close(id)
    }

    /// Evict terminal trackers that ended at least `max_age` ago and close
    /// their subscriptions. Running and paused trackers are never evicted.
    pub fn cleanup_completed(&self, max_age: Duration) -> usize {
        let Some(cutoff) = TimeDelta::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let evicted: Vec<String> = {
            let mut trackers = self.trackers.write().unwrap_or_else(PoisonError::into_inner);
            let expired: Vec<String> = trackers
                .iter()
                .filter(|(_, tracker)| {
                    tracker.status().is_terminal()
                        && tracker.end_time().is_some_and(|end| end <= cutoff)
                })
                .map(|(id, _)| id.clone())
                .collect();
            for id in &expired {
                trackers.remove(id);
            }
            expired
        };

        for id in &evicted {
            self.hub.close(id);
        }
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "evicted finished trackers");
        }
        evicted.len()
    }

    pub fn stats(&self) -> TrackerStats {
        let mut stats = TrackerStats::default();
        for tracker in self.snapshot_trackers() {
            stats.total_operations += 1;
            *stats.by_status.entry(tracker.status()).or_default() += 1;
            *stats.by_kind.entry(tracker.kind()).or_default() += 1;
        }
        stats
    }

    /// Re-broadcast every running tracker at a fixed interval until `token`
    /// is cancelled. Each tick also evicts trackers that finished longer
    /// than the retention window ago.
    pub async fn start_auto_reporting(&self, interval: Duration, token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    for tracker in self.snapshot_trackers() {
                        if tracker.status() == OperationStatus::Running {
                            tracker.publish();
                        }
                    }
                    self.cleanup_completed(self.retention);
                }
            }
        }
        tracing::debug!("auto reporting stopped");
    }

    fn snapshot_trackers(&self) -> Vec<Arc<OperationTracker>> {
        self.trackers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

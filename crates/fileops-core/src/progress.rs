//! Progress snapshots.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::operation::{OperationKind, OperationStatus};

/// Free-form key/value details attached to snapshots and results.
pub type Details = BTreeMap<String, serde_json::Value>;

/// Immutable point-in-time copy of an operation's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub id: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Human-readable name of the current phase.
    pub current_step: String,
    pub steps_completed: usize,
    pub total_steps: usize,
    pub items_processed: u64,
    /// Total items (0 if unknown).
    pub total_items: u64,
    pub bytes_processed: u64,
    /// Total bytes (0 if unknown).
    pub total_bytes: u64,
    /// Throughput in items per second over the recent sample window.
    pub speed: f64,
    /// Estimated time remaining, if one can be computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<Duration>,
    /// Most recent error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub error_count: usize,
    #[serde(default)]
    pub details: Details,
}

impl ProgressInfo {
    /// Create a snapshot for an operation that has not started.
    pub fn pending(id: impl Into<String>, kind: OperationKind, total_steps: usize) -> Self {
        Self {
            id: id.into(),
            kind,
            status: OperationStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            current_step: String::new(),
            steps_completed: 0,
            total_steps,
            items_processed: 0,
            total_items: 0,
            bytes_processed: 0,
            total_bytes: 0,
            speed: 0.0,
            eta: None,
            error: None,
            error_count: 0,
            details: Details::new(),
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes > 0 {
            (self.bytes_processed as f64 / self.total_bytes as f64 * 100.0).min(100.0)
        } else if self.total_items > 0 {
            (self.items_processed as f64 / self.total_items as f64 * 100.0).min(100.0)
        } else {
            0.0
        }
    }

    /// Check if the operation has finished.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_prefers_bytes() {
        let mut info = ProgressInfo::pending("cleanup-1", OperationKind::Cleanup, 4);
        assert_eq!(info.percentage(), 0.0);

        info.total_items = 10;
        info.items_processed = 5;
        assert_eq!(info.percentage(), 50.0);

        info.total_bytes = 200;
        info.bytes_processed = 50;
        assert_eq!(info.percentage(), 25.0);
    }

    #[test]
    fn test_snapshot_serializes_without_empty_options() {
        let info = ProgressInfo::pending("cleanup-1", OperationKind::Cleanup, 4);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("eta").is_none());
    }
}

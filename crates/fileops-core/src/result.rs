//! Terminal operation records.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::operation::{OperationKind, OperationStatus};
use crate::progress::Details;

/// An error recorded against a single item of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    /// The path that caused the error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// The operation kind that recorded it.
    pub operation: OperationKind,
    /// A human-readable error message.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Whether the rest of the operation carried on after it.
    pub recoverable: bool,
}

impl OperationError {
    /// Create a new operation error stamped with the current time.
    pub fn new(operation: OperationKind, path: Option<PathBuf>, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            path,
            operation,
            message: message.into(),
            timestamp: Utc::now(),
            recoverable,
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Result of a finished operation. Produced exactly once per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub id: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub items_processed: u64,
    pub bytes_processed: u64,
    /// Paths the operation changed (or would change under dry run).
    #[serde(default)]
    pub files_affected: Vec<PathBuf>,
    pub summary: String,
    #[serde(default)]
    pub details: Details,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OperationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl OperationResult {
    /// Check if the operation reached `Completed`.
    ///
    /// A completed run may still carry per-item errors.
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Completed
    }

    /// Check if any item failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get a detail entry as a list of strings.
    pub fn detail_strings(&self, key: &str) -> Vec<String> {
        self.details
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_display() {
        let err = OperationError::new(
            OperationKind::Cleanup,
            Some(PathBuf::from("/data/empty")),
            "permission denied",
            true,
        );
        assert_eq!(err.to_string(), "/data/empty: permission denied");

        let err = OperationError::new(OperationKind::Cleanup, None, "boom", false);
        assert_eq!(err.to_string(), "boom");
    }
}

//! Operation kinds and lifecycle statuses.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The kind of maintenance task.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    /// Remove empty directories.
    Cleanup,
    /// Find duplicate files.
    Deduplication,
    /// Gather files into one location.
    Consolidation,
    /// Group similar images.
    Similarity,
    /// Suggest a file layout.
    Organization,
    /// Change file ownership.
    Ownership,
    /// Run a pipeline file.
    Pipeline,
}

/// Lifecycle status of an operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationStatus {
    /// Created but not started.
    Pending,
    Running,
    /// Running, but parked at its next check point.
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_round_trips_through_strings() {
        assert_eq!(OperationKind::Cleanup.to_string(), "cleanup");
        assert_eq!(OperationKind::from_str("ownership").unwrap(), OperationKind::Ownership);
        assert!(OperationKind::from_str("defrag").is_err());
    }

    #[test]
    fn test_status_predicates() {
        assert!(OperationStatus::Cancelled.is_terminal());
        assert!(!OperationStatus::Paused.is_terminal());
    }
}

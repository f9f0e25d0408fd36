//! Engine error type.

use fileops_core::{ConfigError, OperationKind};
use fileops_fs::FsError;
use thiserror::Error;

/// Errors surfaced by the engine and the manager.
///
/// Per-item failures inside an operation are collected on its tracker and
/// never appear here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No factory is registered for the kind.
    #[error("Operation type {kind} not supported")]
    UnsupportedOperation { kind: OperationKind },

    /// The configuration was rejected before anything ran.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    /// The manager already runs its maximum number of operations.
    #[error("Maximum concurrent operations ({limit}) reached")]
    ConcurrencyLimitExceeded { limit: usize },

    /// No active operation has this id.
    #[error("Operation not found: {id}")]
    OperationNotFound { id: String },

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// A root path could not be processed at all.
    #[error(transparent)]
    Filesystem(#[from] FsError),

    /// The background worker running the operation panicked or was aborted.
    #[error("Operation worker failed: {message}")]
    Worker { message: String },
}

impl EngineError {
    /// Check if this error reports a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EngineError::UnsupportedOperation {
            kind: OperationKind::Similarity,
        };
        assert_eq!(err.to_string(), "Operation type similarity not supported");

        let err = EngineError::from(ConfigError::NoPaths);
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
        assert!(!err.is_cancelled());
        assert!(EngineError::Cancelled.is_cancelled());
    }
}

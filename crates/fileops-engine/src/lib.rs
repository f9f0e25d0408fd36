//! Operation engine for fileops.
//!
//! The [`Engine`] maps each [`OperationKind`] to an [`OperationFactory`],
//! validates configurations, assigns ids and runs operations synchronously
//! while a tracker records their progress. The [`OperationManager`] runs
//! them on tokio's blocking pool instead, caps how many run at once and
//! forwards pause, resume and cancel requests to them.
//!
//! Built-in operations:
//!
//! - [`CleanupOperation`] removes empty directories, bottom-up.
//! - [`OwnershipOperation`] changes the owner of selected entries.
//! - [`PlannedOperation`] stands in for deduplication and consolidation.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use fileops_core::{OperationConfig, OperationKind};
//! use fileops_engine::Engine;
//! use fileops_fs::OsFileSystem;
//! use fileops_progress::ProgressTracker;
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = Engine::with_defaults(Arc::new(OsFileSystem::new()), Arc::new(ProgressTracker::new()));
//! let config = OperationConfig::builder()
//!     .paths(vec![PathBuf::from("/srv/data")])
//!     .dry_run(true)
//!     .build()
//!     .unwrap();
//!
//! let result = engine
//!     .execute_operation(&CancellationToken::new(), OperationKind::Cleanup, config)
//!     .unwrap();
//! println!("{}", result.summary);
//! ```

mod cleanup;
mod engine;
mod error;
mod filter;
mod manager;
mod operation;
mod ownership;
mod planned;

pub use cleanup::{CleanupFactory, CleanupOperation, validate_cleanup};
pub use engine::{Engine, OperationFactory, PreparedOperation};
pub use error::EngineError;
pub use filter::{CleanupPolicy, PathFilter, SYSTEM_DIRECTORIES};
pub use manager::OperationManager;
pub use operation::{BaseOperation, Operation};
pub use ownership::{OwnershipFactory, OwnershipOperation, OwnershipTarget, validate_ownership};
pub use planned::{PlannedFactory, PlannedOperation};

// Re-export core types for convenience
pub use fileops_core::{OperationConfig, OperationKind, OperationResult, OperationStatus};

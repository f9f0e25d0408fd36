//! Core types and configuration for fileops.
//!
//! This crate provides the data model shared by every fileops crate:
//! operation kinds and statuses, the operation configuration, progress
//! snapshots and terminal results.

mod config;
mod error;
mod file;
mod operation;
mod progress;
mod result;

pub use config::{EngineSettings, HashAlgorithm, OperationConfig, OperationConfigBuilder};
pub use error::ConfigError;
pub use file::{FileInfo, file_name, is_hidden_name};
pub use operation::{OperationKind, OperationStatus};
pub use progress::{Details, ProgressInfo};
pub use result::{OperationError, OperationResult};

//! Progress tracking for fileops operations.
//!
//! A [`ProgressTracker`] owns one [`OperationTracker`] per running operation.
//! Operations mutate their tracker; observers read snapshots with
//! [`ProgressTracker::get_progress`] or subscribe to a bounded channel that
//! receives a [`ProgressInfo`] after every mutation.
//!
//! Fan-out never blocks producers. A subscriber that falls behind misses
//! updates rather than slowing the operation down.
//!
//! # Example
//!
//! ```rust,no_run
//! use fileops_core::OperationKind;
//! use fileops_progress::ProgressTracker;
//!
//! # async fn demo() {
//! let registry = ProgressTracker::new();
//! let mut updates = registry.subscribe_all();
//!
//! let tracker = registry.start_operation("cleanup-1", OperationKind::Cleanup, 4);
//! tracker.update_step("Scanning directories");
//!
//! while let Some(info) = updates.recv().await {
//!     println!("{}: {:.1}%", info.id, info.percentage());
//! }
//! # }
//! ```

mod hub;
mod registry;
mod speed;
mod tracker;

pub use hub::{DEFAULT_CAPACITY, SubscriberHub, WILDCARD};
pub use registry::{DEFAULT_RETENTION, ProgressTracker, TrackerStats};
pub use speed::{DEFAULT_WINDOW, SpeedWindow, estimate_eta};
pub use tracker::{OperationTracker, RESUME_POLL_INTERVAL};

pub use fileops_core::ProgressInfo;

//! Filesystem access for fileops.
//!
//! Operations never touch `std::fs` directly. They go through the
//! [`FileSystem`] trait, which has two implementations:
//!
//! - [`OsFileSystem`] walks real trees with jwalk and changes ownership
//!   through `chownat` on Unix.
//! - [`MemoryFileSystem`] keeps a tree in memory, records side effects and
//!   can inject failures, which makes operation behavior testable.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use fileops_fs::{FileSystem, OsFileSystem, WalkOptions, list_paths};
//!
//! let fs = OsFileSystem::new();
//! let paths = list_paths(&fs, Path::new("/tmp"), WalkOptions::default()).unwrap();
//! println!("{} entries", paths.len());
//! ```

mod error;
mod filesystem;
mod hash;
mod memory;
mod os;
#[cfg(unix)]
mod ownership;

pub use error::FsError;
pub use filesystem::{FileSystem, WalkEntry, WalkOptions, WalkVisitor, list_paths, relative_depth};
pub use memory::{ChownCall, MemoryFileSystem};
pub use os::{DEFAULT_CHUNK_SIZE, OsFileSystem};
#[cfg(unix)]
pub use ownership::current_owner;

/// Effective user and group of this process, where the platform has them.
#[cfg(not(unix))]
pub fn current_owner() -> Option<(u32, u32)> {
    None
}

// Re-export core types for convenience
pub use fileops_core::{FileInfo, HashAlgorithm};

//! Session storage backends.
//!
//! A [`Storer`] maps a session id to an opaque string value. The overseer only
//! ever talks to a storer through a shared [`StorerHandle`], so every backend
//! must be `Send + Sync` and handle its own internal synchronization.
//!
//! # Available backends
//!
//! - [`MemoryStorer`]: process-local map with per-session expiry and an
//!   optional background cleaner task.
//! - [`SqliteStorer`]: SQLite-backed persistent storage behind an `r2d2`
//!   pool (feature `sqlite_storer`, enabled by default).
//!
//! # Choosing a backend
//!
//! - For tests and single-process deployments, use [`MemoryStorer`].
//! - For sessions that must survive restarts, use [`SqliteStorer`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use session_overseer::storage::{MemoryStorer, StorerHandle};
//!
//! let storer: StorerHandle = Arc::new(MemoryStorer::new(Duration::from_secs(2 * 24 * 3600)));
//! ```

use std::sync::Arc;

use crate::errors::StorageError;

/// In-memory session storage implementation.
pub mod memory;

/// SQLite-backed session storage implementation.
#[cfg(feature = "sqlite_storer")]
pub mod sqlite;

pub use memory::{CleanerHandle, MemoryStorer};
#[cfg(feature = "sqlite_storer")]
pub use sqlite::SqliteStorer;

/// Object-safe session storage contract.
///
/// `get`, `delete` and `reset_expiry` report a missing or expired session as
/// [`StorageError::NoSession`]; anything else is a backend failure.
pub trait Storer: Send + Sync {
    /// Retrieves the value stored under `id`.
    fn get(&self, id: &str) -> Result<String, StorageError>;

    /// Stores `value` under `id`, creating or overwriting the session and
    /// restarting its expiry.
    fn set(&self, id: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the session stored under `id`.
    fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Restarts the expiry window of the session stored under `id`.
    fn reset_expiry(&self, id: &str) -> Result<(), StorageError>;
}

/// A shared handle to a type-erased [`Storer`].
pub type StorerHandle = Arc<dyn Storer>;

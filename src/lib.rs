//! Cookie-backed server-side sessions.
//!
//! A [`StorageOverseer`] maps a session cookie to a value held by a
//! [`Storer`] backend. Session cookies are buffered per request and flushed
//! exactly once, when the response status is committed.

pub mod config;
pub mod cookies;
pub mod errors;
pub mod flash;
pub mod middleware;
pub mod net;
pub mod overseer;
pub mod storage;

pub use config::CookieOptions;
pub use errors::{SessionError, StorageError};
pub use middleware::{Handler, ResetMiddleware, SessionMiddleware};
pub use net::{ResponseRecorder, ResponseWriter, SessionResponse};
pub use overseer::{Overseer, Resetter, StorageOverseer};
pub use storage::{MemoryStorer, Storer, StorerHandle};

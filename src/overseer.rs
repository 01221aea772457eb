//! The session overseer.
//!
//! [`StorageOverseer`] ties a [`Storer`](crate::storage::Storer) to the session
//! cookie described by [`CookieOptions`]. Every operation follows the same
//! phases: resolve the session id, talk to the backend, then record the
//! resulting cookie in the request's [`CookieBuffer`]. Cookies are never written
//! to the response directly; the buffer is flushed once when the response
//! status is committed (see [`SessionResponse`](crate::net::SessionResponse)).
//!
//! Id resolution looks at the buffer before the request: a cookie buffered
//! earlier in the same request is the current state of the session, and a
//! buffered removal cookie means the session is gone.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use http::Request;
//! use session_overseer::config::CookieOptions;
//! use session_overseer::net::{ResponseRecorder, SessionResponse};
//! use session_overseer::overseer::{Overseer, StorageOverseer};
//! use session_overseer::storage::MemoryStorer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let opts = CookieOptions::builder().name("sess").build()?;
//! let overseer = StorageOverseer::new(opts, Arc::new(MemoryStorer::new(Duration::from_secs(3600))))?;
//!
//! let req = Request::new(());
//! let mut w = SessionResponse::new(ResponseRecorder::new());
//! overseer.set(&mut w, &req, "hello")?;
//! assert_eq!(overseer.get(&mut w, &req)?, "hello");
//! # Ok(()) }
//! ```

use http::Request;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::config::CookieOptions;
use crate::cookies::CookieBuffer;
use crate::errors::{SessionError, StorageError};
use crate::middleware::{ResetMiddleware, SessionMiddleware};
use crate::net::ResponseWriter;
use crate::storage::StorerHandle;

/// Resets the expiry of the current session. Driven by
/// [`ResetMiddleware`] on every request.
pub trait Resetter {
    fn reset_expiry<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<(), SessionError>;
}

/// The full set of session operations.
pub trait Overseer: Resetter {
    /// Returns the value of the current session.
    fn get<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<String, SessionError>;

    /// Stores `value` in the current session, creating the session if needed.
    fn set<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>, value: &str) -> Result<(), SessionError>;

    /// Deletes the current session, if any, and expires its cookie.
    fn del<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<(), SessionError>;

    /// Moves the current session's value to a freshly minted id.
    fn regenerate<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<(), SessionError>;

    /// Returns the current session id.
    fn session_id<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<String, SessionError>;
}

/// Generates a new, globally unique session id.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Session overseer backed by a [`Storer`](crate::storage::Storer).
#[derive(Clone)]
pub struct StorageOverseer {
    storer: StorerHandle,
    options: CookieOptions,
}

impl std::fmt::Debug for StorageOverseer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageOverseer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl StorageOverseer {
    /// Creates an overseer. Fails if `options` are invalid, most notably when
    /// the cookie name is empty.
    pub fn new(options: CookieOptions, storer: StorerHandle) -> Result<Self, SessionError> {
        options.validate()?;
        Ok(Self { storer, options })
    }

    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    pub fn storer(&self) -> &StorerHandle {
        &self.storer
    }

    /// Wraps `next` so that it runs with a cookie buffer installed.
    pub fn middleware<H>(&self, next: H) -> SessionMiddleware<H> {
        SessionMiddleware::new(next)
    }

    /// Wraps `next` so that the session expiry is reset on every request.
    ///
    /// Must itself run inside a [`SessionMiddleware`]; see
    /// [`middleware_with_reset`](Self::middleware_with_reset) for both in one.
    pub fn reset_middleware<H>(&self, next: H) -> ResetMiddleware<H, StorageOverseer> {
        ResetMiddleware::new(self.clone(), next)
    }

    /// The session middleware wrapping the reset middleware wrapping `next`.
    pub fn middleware_with_reset<H>(&self, next: H) -> SessionMiddleware<ResetMiddleware<H, StorageOverseer>> {
        self.middleware(self.reset_middleware(next))
    }

    /// Resolves the id from the buffer first, then from the request cookie.
    fn resolve_id<B>(&self, buffer: Option<&CookieBuffer>, req: &Request<B>) -> Result<String, SessionError> {
        if let Some(cookie) = buffer.and_then(|b| b.get_cookie(&self.options.name)) {
            if cookie.is_removal() || cookie.value.trim().is_empty() {
                return Err(SessionError::NoSessionId);
            }
            return Ok(cookie.value.clone());
        }
        self.options.session_id_from(req.headers())
    }

    fn buffer<'w>(&self, w: &'w mut dyn ResponseWriter) -> Result<&'w mut CookieBuffer, SessionError> {
        w.cookie_buffer().ok_or(SessionError::MissingCookieBuffer)
    }
}

impl Resetter for StorageOverseer {
    /// Restarts the server-side expiry and, for persistent cookies, re-issues
    /// the cookie so the client-side expiry moves with it.
    fn reset_expiry<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<(), SessionError> {
        let buffer = self.buffer(w)?;
        let id = self.resolve_id(Some(&*buffer), req)?;

        self.storer
            .reset_expiry(&id)
            .map_err(|e| SessionError::storage("reset expiry of server-side session", e))?;

        if !self.options.is_session_only() {
            buffer.set_cookie(self.options.make_cookie(&id))?;
        }
        Ok(())
    }
}

impl Overseer for StorageOverseer {
    fn get<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<String, SessionError> {
        let id = self.resolve_id(w.cookie_buffer().map(|b| &*b), req)?;

        self.storer
            .get(&id)
            .map_err(|e| SessionError::storage("get session value", e))
    }

    fn set<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>, value: &str) -> Result<(), SessionError> {
        let buffer = self.buffer(w)?;

        let id = match self.resolve_id(Some(&*buffer), req) {
            Ok(id) => id,
            Err(SessionError::NoSessionId) => {
                let id = new_session_id();
                log::debug!("minted session id for cookie {:?}", self.options.name);
                id
            }
            Err(e) => return Err(e),
        };

        self.storer
            .set(&id, value)
            .map_err(|e| SessionError::storage("set session value", e))?;

        // Re-issued even for an existing id so cookie attributes stay fresh.
        buffer.set_cookie(self.options.make_cookie(&id))
    }

    fn del<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<(), SessionError> {
        let buffer = self.buffer(w)?;

        let id = match self.resolve_id(Some(&*buffer), req) {
            Ok(id) => id,
            Err(SessionError::NoSessionId) => return Ok(()),
            Err(e) => return Err(e),
        };

        buffer.set_cookie(self.options.deletion_cookie())?;

        match self.storer.delete(&id) {
            Ok(()) | Err(StorageError::NoSession) => Ok(()),
            Err(e) => Err(SessionError::storage("delete server-side session", e)),
        }
    }

    fn regenerate<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<(), SessionError> {
        let buffer = self.buffer(w)?;
        let old_id = self.resolve_id(Some(&*buffer), req)?;

        let value = self
            .storer
            .get(&old_id)
            .map_err(|e| SessionError::storage("get session value", e))?;

        // The new id supersedes the old record, so a failed delete is not fatal.
        if let Err(e) = self.storer.delete(&old_id) {
            log::warn!("unable to delete old session during regenerate: {e}");
        }

        let new_id = new_session_id();
        self.storer
            .set(&new_id, &value)
            .map_err(|e| SessionError::storage("set session value", e))?;

        log::debug!("regenerated session id for cookie {:?}", self.options.name);
        buffer.set_cookie(self.options.make_cookie(&new_id))
    }

    fn session_id<B>(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<String, SessionError> {
        self.resolve_id(w.cookie_buffer().map(|b| &*b), req)
    }
}

/// Reads the session value and decodes it from JSON.
pub fn get_obj<O, T, B>(overseer: &O, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<T, SessionError>
where
    O: Overseer + ?Sized,
    T: DeserializeOwned,
{
    let value = overseer.get(w, req)?;
    Ok(serde_json::from_str(&value)?)
}

/// Encodes `obj` as JSON and stores it as the session value.
pub fn set_obj<O, T, B>(overseer: &O, w: &mut dyn ResponseWriter, req: &Request<B>, obj: &T) -> Result<(), SessionError>
where
    O: Overseer + ?Sized,
    T: Serialize + ?Sized,
{
    let value = serde_json::to_string(obj)?;
    overseer.set(w, req, &value)
}

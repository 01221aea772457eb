//! Request-scoped cookie write buffer.
//!
//! Session operations never touch the response directly. They record the
//! cookie they want sent in a [`CookieBuffer`], and the buffer is flushed once,
//! when the response status is committed. Later operations on the same cookie
//! name overwrite earlier ones, so the client only ever sees the final state.

use std::collections::BTreeMap;

use http::header::SET_COOKIE;
use http::{HeaderValue, StatusCode};

use crate::cookies::Cookie;
use crate::errors::SessionError;
use crate::net::ResponseWriter;

#[derive(Debug, Default)]
pub struct CookieBuffer {
    cookies: BTreeMap<String, Cookie>,
    committed: bool,
}

impl CookieBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `cookie`, replacing any buffered cookie with the same name.
    ///
    /// A cookie that does not render to a valid header value is rejected here
    /// rather than dropped at commit time.
    pub fn set_cookie(&mut self, cookie: Cookie) -> Result<(), SessionError> {
        if cookie.name.is_empty() {
            return Err(SessionError::EmptyCookieName);
        }
        if let Err(e) = HeaderValue::try_from(cookie.to_string()) {
            return Err(SessionError::UnsendableCookie { name: cookie.name, reason: e.to_string() });
        }
        if self.committed {
            log::warn!("cookie {:?} buffered after headers were committed; it will not be sent", cookie.name);
        }

        self.cookies.insert(cookie.name.clone(), cookie);
        Ok(())
    }

    pub fn get_cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    pub fn cookies(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Writes the buffered cookies to `sink` and then commits `status`.
    ///
    /// Cookies are appended as `Set-Cookie` headers on the first call only;
    /// every later call just forwards the status.
    pub fn commit(&mut self, sink: &mut dyn ResponseWriter, status: StatusCode) {
        if !self.committed {
            self.committed = true;

            let headers = sink.headers_mut();
            for cookie in self.cookies.values() {
                match HeaderValue::try_from(cookie.to_string()) {
                    Ok(value) => {
                        headers.append(SET_COOKIE, value);
                    }
                    Err(e) => log::error!("dropping cookie {:?} with invalid header value: {}", cookie.name, e),
                }
            }
            log::debug!("flushed {} buffered cookie(s)", self.cookies.len());
        }

        sink.write_header(status);
    }
}

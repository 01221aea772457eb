//! Cookie core types.
//!
//! [`Cookie`] is the outbound cookie model written as a `Set-Cookie` header
//! value through its [`Display`](std::fmt::Display) implementation:
//!
//! ```rust
//! use session_overseer::cookies::{Cookie, SameSite};
//!
//! let c = Cookie {
//!     path: Some("/".into()),
//!     http_only: true,
//!     same_site: Some(SameSite::Lax),
//!     ..Cookie::new("id", "abc123")
//! };
//! assert_eq!(c.to_string(), "id=abc123; Path=/; HttpOnly; SameSite=Lax");
//! ```
//!
//! Inbound cookies are only ever looked up by name, see [`request_cookie`].

use std::fmt;

use http::header::COOKIE;
use http::HeaderMap;
use serde::Deserialize;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// SameSite policy for a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => f.write_str("Strict"),
            SameSite::Lax => f.write_str("Lax"),
            SameSite::None => f.write_str("None"),
        }
    }
}

/// A cookie as written to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name (case-sensitive). Must not be empty.
    pub name: String,

    /// Raw cookie value (not URL-encoded).
    pub value: String,

    /// Path scoping (e.g. `"/"`).
    pub path: Option<String>,

    /// Domain scoping, host-only if `None`.
    pub domain: Option<String>,

    /// Absolute expiry. `None` together with `max_age: None` makes a
    /// browser-session cookie.
    pub expires: Option<OffsetDateTime>,

    /// Relative expiry in seconds. Zero or negative tells the client to drop the
    /// cookie immediately.
    pub max_age: Option<i64>,

    /// If `true`, cookie is sent only over HTTPS.
    pub secure: bool,

    /// If `true`, cookie is hidden from client-side scripts.
    pub http_only: bool,

    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// A bare `name=value` cookie without attributes.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Returns true when this cookie instructs the client to discard it.
    pub fn is_removal(&self) -> bool {
        matches!(self.max_age, Some(age) if age <= 0)
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;

        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={}", domain.trim_start_matches('.'))?;
        }
        if let Some(expires) = self.expires {
            let fixdate = format_description!(
                "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
            );
            let formatted = expires
                .to_offset(UtcOffset::UTC)
                .format(&fixdate)
                .map_err(|_| fmt::Error)?;
            write!(f, "; Expires={formatted}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age.max(0))?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if let Some(same_site) = self.same_site {
            write!(f, "; SameSite={same_site}")?;
        }

        Ok(())
    }
}

/// Returns the value of the first request cookie called `name`.
///
/// All `Cookie` headers are searched, each holding `;`-separated `name=value`
/// pairs. Pairs without `=` and headers that are not valid UTF-8 are skipped.
pub fn request_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"'))
}

//! Session cookie configuration.
//!
//! [`CookieOptions`] describes the identifier-bearing cookie: its name,
//! lifetime and scoping flags. It is handed to a
//! [`StorageOverseer`](crate::overseer::StorageOverseer) once and never mutated
//! afterwards.
//!
//! # Examples
//!
//! ## Customize with the builder
//! ```rust
//! use std::time::Duration;
//! use session_overseer::config::CookieOptions;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let opts = CookieOptions::builder()
//!     .name("sess")
//!     .max_age(Duration::from_secs(3600))
//!     .domain("example.com")
//!     .build()?; // returns Result<CookieOptions, CookieOptionsError>
//! assert_eq!(opts.name, "sess");
//! # Ok(()) }
//! ```
//!
//! ## Load from JSON
//! ```rust
//! use session_overseer::config::CookieOptions;
//! let opts = CookieOptions::from_json_str(r#"{ "name": "sess", "max_age": 60 }"#).unwrap();
//! assert_eq!(opts.max_age.as_secs(), 60);
//! assert!(opts.http_only);
//! ```
//!
//! # Fields (summary)
//! - `name`: cookie name, required and non-empty (default: `"id"`).
//! - `max_age`: cookie lifetime; zero makes a browser-session cookie (default: 0).
//! - `domain`: optional `Domain` attribute.
//! - `path`: `Path` attribute (default: `"/"`).
//! - `secure`: HTTPS-only cookie (default: `true`).
//! - `http_only`: hidden from scripts (default: `true`).
//! - `same_site`: optional `SameSite` policy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::cookies::SameSite;

const DEFAULT_COOKIE_NAME: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    pub name: String,
    #[serde(deserialize_with = "duration_from_secs")]
    pub max_age: Duration,
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            max_age: Duration::ZERO,
            domain: None,
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: None,
        }
    }
}

impl CookieOptions {
    pub fn builder() -> CookieOptionsBuilder {
        CookieOptionsBuilder::default()
    }

    /// Parses and validates options from a JSON document. Missing fields take
    /// their defaults; `max_age` is given in whole seconds.
    pub fn from_json_str(json: &str) -> Result<Self, CookieOptionsError> {
        let opts: CookieOptions =
            serde_json::from_str(json).map_err(|e| CookieOptionsError::Parse(e.to_string()))?;
        validate(&opts)?;
        Ok(opts)
    }

    /// Checks the invariants a [`StorageOverseer`](crate::overseer::StorageOverseer) relies on.
    pub fn validate(&self) -> Result<(), CookieOptionsError> {
        validate(self)
    }

    /// Whether the cookie disappears when the browser closes.
    pub fn is_session_only(&self) -> bool {
        self.max_age.is_zero()
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

/// Builder for [`CookieOptions`].
#[derive(Debug, Clone, Default)]
pub struct CookieOptionsBuilder {
    inner: CookieOptions,
}

impl CookieOptionsBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut CookieOptions)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn name<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.name = name.into()) }
    pub fn max_age(self, age: Duration) -> Self { self.map(|c| c.max_age = age) }
    pub fn domain<S: Into<String>>(self, domain: S) -> Self { self.map(|c| c.domain = Some(domain.into())) }
    pub fn path<S: Into<String>>(self, path: S) -> Self { self.map(|c| c.path = path.into()) }
    pub fn secure(self, on: bool) -> Self { self.map(|c| c.secure = on) }
    pub fn http_only(self, on: bool) -> Self { self.map(|c| c.http_only = on) }
    pub fn same_site(self, policy: SameSite) -> Self { self.map(|c| c.same_site = Some(policy)) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut CookieOptions)) -> Self { self.map(f) }

    /// Validate and build the final options.
    pub fn build(self) -> Result<CookieOptions, CookieOptionsError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieOptionsError {
    EmptyName,
    InvalidName(String),
    InsecureSameSiteNone,
    InvalidAttribute { attribute: &'static str, value: String },
    Parse(String),
}

impl fmt::Display for CookieOptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookieOptionsError::EmptyName =>
                write!(f, "cookie name must be provided"),
            CookieOptionsError::InvalidName(name) =>
                write!(f, "cookie name {name:?} contains separators or whitespace"),
            CookieOptionsError::InsecureSameSiteNone =>
                write!(f, "SameSite=None requires the secure flag"),
            CookieOptionsError::InvalidAttribute { attribute, value } =>
                write!(f, "cookie {attribute} {value:?} contains separators, whitespace or control characters"),
            CookieOptionsError::Parse(msg) =>
                write!(f, "cannot parse cookie options: {msg}"),
        }
    }
}
impl std::error::Error for CookieOptionsError {}

fn validate(c: &CookieOptions) -> Result<(), CookieOptionsError> {
    if c.name.is_empty() {
        return Err(CookieOptionsError::EmptyName);
    }
    if c.name.chars().any(|ch| ch.is_whitespace() || ch.is_control() || "=;,\"".contains(ch)) {
        return Err(CookieOptionsError::InvalidName(c.name.clone()));
    }
    check_attribute("path", &c.path)?;
    if let Some(domain) = &c.domain {
        check_attribute("domain", domain)?;
    }
    if c.same_site == Some(SameSite::None) && !c.secure {
        return Err(CookieOptionsError::InsecureSameSiteNone);
    }
    Ok(())
}

/// Attribute values are written verbatim into `Set-Cookie`.
fn check_attribute(attribute: &'static str, value: &str) -> Result<(), CookieOptionsError> {
    if value.chars().any(|ch| ch == ';' || ch.is_whitespace() || ch.is_control()) {
        return Err(CookieOptionsError::InvalidAttribute { attribute, value: value.to_string() });
    }
    Ok(())
}

use http::HeaderMap;
use time::OffsetDateTime;

use crate::config::CookieOptions;
use crate::cookies::{request_cookie, Cookie};
use crate::errors::SessionError;

impl CookieOptions {
    /// Builds the session cookie carrying `session_id`.
    ///
    /// A non-zero `max_age` yields both `Expires` (now + max-age) and `Max-Age`;
    /// zero yields a browser-session cookie without either.
    pub fn make_cookie(&self, session_id: &str) -> Cookie {
        let (expires, max_age) = if self.is_session_only() {
            (None, None)
        } else {
            let secs = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
            let expires = time::Duration::try_from(self.max_age)
                .ok()
                .and_then(|age| OffsetDateTime::now_utc().checked_add(age));
            (expires, Some(secs))
        };

        Cookie {
            expires,
            max_age,
            ..self.base_cookie(session_id)
        }
    }

    /// Builds a cookie that tells the client to discard the session cookie now.
    pub fn deletion_cookie(&self) -> Cookie {
        Cookie {
            expires: Some(OffsetDateTime::UNIX_EPOCH),
            max_age: Some(0),
            ..self.base_cookie("")
        }
    }

    /// Reads the session id from the request's cookie headers.
    ///
    /// An absent cookie and a blank value are both reported as
    /// [`SessionError::NoSessionId`].
    pub fn session_id_from(&self, headers: &HeaderMap) -> Result<String, SessionError> {
        match request_cookie(headers, &self.name) {
            Some(id) if !id.trim().is_empty() => Ok(id.to_string()),
            _ => Err(SessionError::NoSessionId),
        }
    }

    fn base_cookie(&self, value: &str) -> Cookie {
        Cookie {
            path: Some(self.path.clone()),
            domain: self.domain.clone(),
            secure: self.secure,
            http_only: self.http_only,
            same_site: self.same_site,
            ..Cookie::new(self.name.clone(), value)
        }
    }
}

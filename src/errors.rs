use crate::config::CookieOptionsError;

/// Errors surfaced by the session overseer and its middleware.
///
/// `NoSessionId` and `NoSession` are ordinary outcomes callers branch on
/// (usually meaning "not logged in"). `Storage` wraps backend failures with the
/// operation that hit them. The remaining variants are integration errors: they
/// point at a misconfigured overseer or a misordered middleware chain and are
/// not expected at runtime.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no session id in request")]
    NoSessionId,

    #[error("no session found for id")]
    NoSession,

    #[error("unable to {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("cookie name cannot be empty")]
    EmptyCookieName,

    #[error("cookie {name:?} cannot be sent as a Set-Cookie header: {reason}")]
    UnsendableCookie { name: String, reason: String },

    #[error("cookie buffer missing: the session middleware must run before this handler")]
    MissingCookieBuffer,

    #[error("invalid cookie options: {0}")]
    InvalidOptions(#[from] CookieOptionsError),

    #[error("session value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// True for both "no id presented" and "id presented but unknown".
    pub fn is_no_session(&self) -> bool {
        matches!(self, SessionError::NoSessionId | SessionError::NoSession)
    }

    /// True for errors caused by wiring mistakes rather than runtime conditions.
    pub fn is_integration_error(&self) -> bool {
        matches!(
            self,
            SessionError::EmptyCookieName
                | SessionError::UnsendableCookie { .. }
                | SessionError::MissingCookieBuffer
                | SessionError::InvalidOptions(_)
        )
    }

    pub(crate) fn storage(op: &'static str, err: StorageError) -> Self {
        match err {
            StorageError::NoSession => SessionError::NoSession,
            StorageError::Backend(source) => SessionError::Storage { op, source },
        }
    }
}

/// Errors reported by a [`Storer`](crate::storage::Storer) backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend holds no (live) record for the requested id.
    #[error("session not found")]
    NoSession,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

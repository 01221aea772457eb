//! Handler chain plumbing.
//!
//! A [`Handler`] serves one request by writing through a
//! [`ResponseWriter`]. Two decorators are provided:
//!
//! - [`SessionMiddleware`] installs the request's cookie buffer by wrapping the
//!   writer in a [`SessionResponse`]. It must be the outermost session-aware
//!   layer.
//! - [`ResetMiddleware`] resets the session expiry before delegating. It has to
//!   run inside a [`SessionMiddleware`]; ordered the other way round every
//!   request fails with [`SessionError::MissingCookieBuffer`].
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use http::{Request, StatusCode};
//! use session_overseer::config::CookieOptions;
//! use session_overseer::middleware::{handler_fn, respond};
//! use session_overseer::net::ResponseWriter;
//! use session_overseer::overseer::{Overseer, StorageOverseer};
//! use session_overseer::storage::MemoryStorer;
//!
//! # fn main() -> anyhow::Result<()> {
//! let overseer = StorageOverseer::new(
//!     CookieOptions::builder().name("sess").build()?,
//!     Arc::new(MemoryStorer::new(Duration::from_secs(3600))),
//! )?;
//!
//! let login = overseer.middleware_with_reset(handler_fn({
//!     let overseer = overseer.clone();
//!     move |w: &mut dyn ResponseWriter, req: &Request<()>| {
//!         overseer.set(w, req, "user=42")?;
//!         w.write_header(StatusCode::NO_CONTENT);
//!         Ok(())
//!     }
//! }));
//!
//! let response = respond(&login, &Request::new(()))?;
//! assert_eq!(response.status(), StatusCode::NO_CONTENT);
//! assert!(response.headers().contains_key("set-cookie"));
//! # Ok(()) }
//! ```

use http::{Request, Response};

use crate::errors::SessionError;
use crate::net::{ResponseRecorder, ResponseWriter, SessionResponse};
use crate::overseer::Resetter;

/// Serves a single request.
pub trait Handler<B> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> anyhow::Result<()>;
}

impl<B, F> Handler<B> for F
where
    F: Fn(&mut dyn ResponseWriter, &Request<B>) -> anyhow::Result<()>,
{
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> anyhow::Result<()> {
        self(w, req)
    }
}

/// Pins a closure to the [`Handler`] signature so its argument types are inferred.
pub fn handler_fn<B, F>(f: F) -> F
where
    F: Fn(&mut dyn ResponseWriter, &Request<B>) -> anyhow::Result<()>,
{
    f
}

/// Runs `handler` against an in-memory writer and returns the finished response.
pub fn respond<B, H>(handler: &H, req: &Request<B>) -> anyhow::Result<Response<Vec<u8>>>
where
    H: Handler<B> + ?Sized,
{
    let mut recorder = ResponseRecorder::new();
    handler.serve(&mut recorder, req)?;
    Ok(recorder.into_response())
}

/// Installs a fresh cookie buffer for every request.
///
/// Buffered cookies are flushed on the first status commit made downstream.
/// When the wrapped handler succeeds without committing anything, `200 OK` is
/// committed on its behalf. A failing handler leaves the response uncommitted
/// so an outer layer can still choose the error status.
#[derive(Debug, Clone)]
pub struct SessionMiddleware<H> {
    next: H,
}

impl<H> SessionMiddleware<H> {
    pub fn new(next: H) -> Self {
        Self { next }
    }
}

impl<B, H: Handler<B>> Handler<B> for SessionMiddleware<H> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> anyhow::Result<()> {
        let mut w = SessionResponse::new(w);
        self.next.serve(&mut w, req)?;
        w.finish();
        Ok(())
    }
}

/// Resets the session expiry on each request before delegating.
///
/// A request without a session id, or whose cookie names a session the
/// backend no longer holds, has nothing to reset and passes through. Any other
/// failure aborts the request.
#[derive(Debug, Clone)]
pub struct ResetMiddleware<H, R> {
    resetter: R,
    next: H,
}

impl<H, R: Resetter> ResetMiddleware<H, R> {
    pub fn new(resetter: R, next: H) -> Self {
        Self { resetter, next }
    }
}

impl<B, H: Handler<B>, R: Resetter> Handler<B> for ResetMiddleware<H, R> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request<B>) -> anyhow::Result<()> {
        match self.resetter.reset_expiry(w, req) {
            Ok(()) => {}
            Err(e) if e.is_no_session() => {
                log::debug!("no live session to reset: {e}");
            }
            Err(e) => {
                log::error!("session expiry reset failed: {e}");
                return Err(e.into());
            }
        }

        self.next.serve(w, req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overseer::tests::{overseer_with, request};
    use crate::overseer::{Overseer, StorageOverseer};
    use crate::storage::{MemoryStorer, Storer};
    use http::header::SET_COOKIE;
    use http::StatusCode;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::time::Duration;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn setup(max_age: u64) -> (StorageOverseer, Arc<MemoryStorer>) {
        init_logging();
        let storer = Arc::new(MemoryStorer::new(Duration::from_secs(3600)));
        (overseer_with(max_age, storer.clone()), storer)
    }

    fn set_cookies(response: &Response<Vec<u8>>) -> Vec<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn cookie_value(set_cookie: &str) -> &str {
        set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, v)| v)
            .unwrap()
    }

    struct MockResetter {
        called: Cell<bool>,
        result: fn() -> Result<(), SessionError>,
    }

    impl MockResetter {
        fn returning(result: fn() -> Result<(), SessionError>) -> Self {
            Self { called: Cell::new(false), result }
        }
    }

    impl Resetter for MockResetter {
        fn reset_expiry<B>(&self, _w: &mut dyn ResponseWriter, _req: &Request<B>) -> Result<(), SessionError> {
            self.called.set(true);
            (self.result)()
        }
    }

    #[test]
    fn reset_middleware_calls_resetter_then_next() {
        let next_called = Cell::new(false);
        let next = handler_fn(|_w: &mut dyn ResponseWriter, _req: &Request<()>| {
            next_called.set(true);
            Ok(())
        });
        let mw = ResetMiddleware::new(MockResetter::returning(|| Ok(())), next);

        mw.serve(&mut ResponseRecorder::new(), &request(None)).unwrap();

        assert!(mw.resetter.called.get());
        assert!(next_called.get());
    }

    #[test]
    fn reset_middleware_tolerates_missing_session_id() {
        let next_called = Cell::new(false);
        let next = handler_fn(|_w: &mut dyn ResponseWriter, _req: &Request<()>| {
            next_called.set(true);
            Ok(())
        });
        let mw = ResetMiddleware::new(MockResetter::returning(|| Err(SessionError::NoSessionId)), next);

        mw.serve(&mut ResponseRecorder::new(), &request(None)).unwrap();
        assert!(next_called.get());
    }

    #[test]
    fn reset_middleware_aborts_on_other_failures() {
        let next_called = Cell::new(false);
        let next = handler_fn(|_w: &mut dyn ResponseWriter, _req: &Request<()>| {
            next_called.set(true);
            Ok(())
        });
        let mw = ResetMiddleware::new(
            MockResetter::returning(|| {
                Err(SessionError::Storage {
                    op: "reset expiry of server-side session",
                    source: anyhow::anyhow!("backend unavailable"),
                })
            }),
            next,
        );

        let err = mw.serve(&mut ResponseRecorder::new(), &request(None)).unwrap_err();
        assert!(matches!(err.downcast_ref::<SessionError>(), Some(SessionError::Storage { .. })));
        assert!(!next_called.get());
    }

    #[test]
    fn reset_middleware_before_session_middleware_fails_loudly() {
        let (overseer, _) = setup(3600);
        let misordered = overseer.reset_middleware(overseer.middleware(handler_fn(
            |_w: &mut dyn ResponseWriter, _req: &Request<()>| Ok(()),
        )));

        // Even an anonymous request trips over the missing buffer.
        let err = respond(&misordered, &request(None)).unwrap_err();
        assert!(matches!(err.downcast_ref::<SessionError>(), Some(SessionError::MissingCookieBuffer)));
    }

    #[test]
    fn anonymous_request_passes_through_reset() {
        let (overseer, _) = setup(3600);
        let app = overseer.middleware_with_reset(handler_fn(
            |w: &mut dyn ResponseWriter, _req: &Request<()>| {
                w.write(b"welcome")?;
                Ok(())
            },
        ));

        let response = respond(&app, &request(None)).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), b"welcome");
        assert!(set_cookies(&response).is_empty());
    }

    #[test]
    fn set_in_handler_is_flushed_once() {
        let (overseer, storer) = setup(3600);
        let app = overseer.middleware(handler_fn({
            let overseer = overseer.clone();
            move |w: &mut dyn ResponseWriter, req: &Request<()>| {
                overseer.set(w, req, "hello")?;
                overseer.set(w, req, "hello again")?;
                w.write_header(StatusCode::CREATED);
                w.write_header(StatusCode::OK);
                Ok(())
            }
        }));

        let response = respond(&app, &request(None)).unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("sess="));
        assert!(cookies[0].contains("Max-Age=3600"));
        assert_eq!(storer.get(cookie_value(&cookies[0])).unwrap(), "hello again");
    }

    #[test]
    fn silent_handler_still_flushes_cookies() {
        let (overseer, _) = setup(0);
        let app = overseer.middleware(handler_fn({
            let overseer = overseer.clone();
            move |w: &mut dyn ResponseWriter, req: &Request<()>| {
                overseer.set(w, req, "v")?;
                Ok(())
            }
        }));

        let response = respond(&app, &request(None)).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(set_cookies(&response).len(), 1);
    }

    #[test]
    fn reset_middleware_refreshes_cookie_for_existing_session() {
        let (overseer, storer) = setup(3600);
        storer.set("abc", "v").unwrap();
        let app = overseer.middleware_with_reset(handler_fn(
            |_w: &mut dyn ResponseWriter, _req: &Request<()>| Ok(()),
        ));

        let response = respond(&app, &request(Some("sess=abc"))).unwrap();
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookie_value(&cookies[0]), "abc");
    }

    #[test]
    fn stale_cookie_passes_through_reset_and_can_log_in() {
        // Session-only cookie whose server-side session is gone.
        let (overseer, storer) = setup(0);

        let handler_ran = Cell::new(false);
        let app = overseer.middleware_with_reset(handler_fn({
            let overseer = overseer.clone();
            let handler_ran = &handler_ran;
            move |w: &mut dyn ResponseWriter, req: &Request<()>| {
                handler_ran.set(true);
                overseer.set(w, req, "fresh")?;
                Ok(())
            }
        }));

        let response = respond(&app, &request(Some("sess=evicted"))).unwrap();
        assert!(handler_ran.get());

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert_eq!(storer.get(cookie_value(&cookies[0])).unwrap(), "fresh");
    }

    #[test]
    fn expired_session_does_not_block_the_handler() {
        init_logging();
        let storer = Arc::new(MemoryStorer::new(Duration::from_millis(10)));
        storer.set("abc", "old").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let overseer = overseer_with(0, storer);

        let handler_ran = Cell::new(false);
        let app = overseer.middleware_with_reset(handler_fn(
            |_w: &mut dyn ResponseWriter, _req: &Request<()>| {
                handler_ran.set(true);
                Ok(())
            },
        ));

        respond(&app, &request(Some("sess=abc"))).unwrap();
        assert!(handler_ran.get());
    }

    #[test]
    fn reset_middleware_tolerates_unknown_session() {
        let next_called = Cell::new(false);
        let next = handler_fn(|_w: &mut dyn ResponseWriter, _req: &Request<()>| {
            next_called.set(true);
            Ok(())
        });
        let mw = ResetMiddleware::new(MockResetter::returning(|| Err(SessionError::NoSession)), next);

        mw.serve(&mut ResponseRecorder::new(), &request(Some("sess=stale"))).unwrap();
        assert!(next_called.get());
    }

    #[test]
    fn regenerate_then_delete_in_one_request_sends_removal() {
        let (overseer, storer) = setup(3600);
        storer.set("abc", "v").unwrap();
        let app = overseer.middleware(handler_fn({
            let overseer = overseer.clone();
            move |w: &mut dyn ResponseWriter, req: &Request<()>| {
                overseer.regenerate(w, req)?;
                overseer.del(w, req)?;
                Ok(())
            }
        }));

        let response = respond(&app, &request(Some("sess=abc"))).unwrap();
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("sess=;"));
        assert!(cookies[0].contains("Max-Age=0"));
        assert!(storer.is_empty());
    }

    #[test]
    fn failing_handler_leaves_response_uncommitted() {
        let (overseer, _) = setup(3600);
        let app = overseer.middleware(handler_fn({
            let overseer = overseer.clone();
            move |w: &mut dyn ResponseWriter, req: &Request<()>| {
                overseer.set(w, req, "v")?;
                anyhow::bail!("handler failed")
            }
        }));

        let mut recorder = ResponseRecorder::new();
        assert!(app.serve(&mut recorder, &request(None)).is_err());
        assert_eq!(recorder.status(), None);
        assert!(recorder.set_cookies().is_empty());
    }
}

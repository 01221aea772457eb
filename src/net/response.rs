//! The response-writing capability handed to handlers.
//!
//! ## Notes
//! - `headers` is an `http::HeaderMap`, which is **case-insensitive** for
//!   header names. Headers must be set before the status is written.
//! - `write_header` commits the status and headers. Only the first call has an
//!   effect on the wire; implementations ignore later calls.
//! - `write` on a writer that has not committed a status implies `200 OK`.

use http::{HeaderMap, StatusCode};

use crate::cookies::CookieBuffer;

pub trait ResponseWriter {
    /// Response headers that will be sent on commit.
    fn headers(&self) -> &HeaderMap;

    /// Mutable access to the pending response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commits the status line and headers.
    fn write_header(&mut self, status: StatusCode);

    /// Appends body bytes, committing `200 OK` first if nothing was committed.
    fn write(&mut self, body: &[u8]) -> std::io::Result<usize>;

    /// The request-scoped cookie buffer, if a session middleware installed one
    /// on this writer.
    fn cookie_buffer(&mut self) -> Option<&mut CookieBuffer> {
        None
    }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        (**self).write_header(status)
    }

    fn write(&mut self, body: &[u8]) -> std::io::Result<usize> {
        (**self).write(body)
    }

    fn cookie_buffer(&mut self) -> Option<&mut CookieBuffer> {
        (**self).cookie_buffer()
    }
}

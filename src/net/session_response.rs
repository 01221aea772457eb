use http::{HeaderMap, StatusCode};

use crate::cookies::CookieBuffer;
use crate::net::ResponseWriter;

/// A [`ResponseWriter`] decorator owning the request's [`CookieBuffer`].
///
/// The first status commit (explicit, or implied by the first body write)
/// flushes the buffered cookies into the wrapped writer's headers before the
/// status is forwarded. Downstream code sees the same writer interface and
/// reaches the buffer through [`ResponseWriter::cookie_buffer`].
#[derive(Debug)]
pub struct SessionResponse<W> {
    inner: W,
    buffer: CookieBuffer,
}

impl<W: ResponseWriter> SessionResponse<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: CookieBuffer::new(),
        }
    }

    pub fn buffer(&self) -> &CookieBuffer {
        &self.buffer
    }

    pub fn is_committed(&self) -> bool {
        self.buffer.is_committed()
    }

    /// Commits `200 OK` if the handler never committed a status, so pending
    /// cookies still reach the client.
    pub fn finish(&mut self) {
        if !self.buffer.is_committed() {
            self.write_header(StatusCode::OK);
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: ResponseWriter> ResponseWriter for SessionResponse<W> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.buffer.commit(&mut self.inner, status);
    }

    fn write(&mut self, body: &[u8]) -> std::io::Result<usize> {
        if !self.buffer.is_committed() {
            self.write_header(StatusCode::OK);
        }
        self.inner.write(body)
    }

    fn cookie_buffer(&mut self) -> Option<&mut CookieBuffer> {
        Some(&mut self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::Cookie;
    use crate::net::ResponseRecorder;

    #[test]
    fn first_commit_flushes_buffer() {
        let mut recorder = ResponseRecorder::new();
        {
            let mut w = SessionResponse::new(&mut recorder);
            w.cookie_buffer().unwrap().set_cookie(Cookie::new("sess", "abc")).unwrap();
            w.write_header(StatusCode::FOUND);
            w.write_header(StatusCode::OK);
        }

        assert_eq!(recorder.status(), Some(StatusCode::FOUND));
        assert_eq!(recorder.set_cookies(), vec!["sess=abc"]);
    }

    #[test]
    fn body_write_triggers_flush() {
        let mut w = SessionResponse::new(ResponseRecorder::new());
        w.cookie_buffer().unwrap().set_cookie(Cookie::new("sess", "abc")).unwrap();
        w.write(b"hi").unwrap();
        w.write(b"!").unwrap();

        let recorder = w.into_inner();
        assert_eq!(recorder.header_writes(), 1);
        assert_eq!(recorder.set_cookies(), vec!["sess=abc"]);
        assert_eq!(recorder.body(), b"hi!");
    }

    #[test]
    fn finish_commits_silent_handlers_once() {
        let mut w = SessionResponse::new(ResponseRecorder::new());
        w.cookie_buffer().unwrap().set_cookie(Cookie::new("sess", "abc")).unwrap();
        w.finish();
        w.finish();

        assert!(w.is_committed());
        let recorder = w.into_inner();
        assert_eq!(recorder.status(), Some(StatusCode::OK));
        assert_eq!(recorder.header_writes(), 1);
        assert_eq!(recorder.set_cookies(), vec!["sess=abc"]);
    }

    #[test]
    fn bare_writer_has_no_buffer() {
        let mut recorder = ResponseRecorder::new();
        assert!(recorder.cookie_buffer().is_none());
    }
}

use http::header::SET_COOKIE;
use http::{HeaderMap, Response, StatusCode};

use crate::net::ResponseWriter;

/// Fully buffered, in-memory [`ResponseWriter`].
///
/// Records the first committed status, the headers as they were at commit time
/// and the raw body bytes. Useful for tests and for embedding the middleware in
/// hosts that build an `http::Response` after the handler returns.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    headers: HeaderMap,
    committed_headers: Option<HeaderMap>,
    status: Option<StatusCode>,
    header_writes: usize,
    body: Vec<u8>,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, `None` if nothing was committed yet.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Number of `write_header` calls received, superfluous ones included.
    pub fn header_writes(&self) -> usize {
        self.header_writes
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Headers as sent: the commit-time snapshot, or the pending headers if
    /// nothing was committed yet.
    pub fn sent_headers(&self) -> &HeaderMap {
        self.committed_headers.as_ref().unwrap_or(&self.headers)
    }

    /// All sent `Set-Cookie` header values in insertion order.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.sent_headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Converts the recording into an `http::Response`. An uncommitted recorder
    /// becomes `200 OK`, the status a host would send for a silent handler.
    pub fn into_response(self) -> Response<Vec<u8>> {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.committed_headers.unwrap_or(self.headers);
        response
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.header_writes += 1;
        match self.status {
            Some(committed) => {
                log::warn!("superfluous write_header({status}), response already committed with {committed}")
            }
            None => {
                self.status = Some(status);
                self.committed_headers = Some(self.headers.clone());
            }
        }
    }

    fn write(&mut self, body: &[u8]) -> std::io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(body);
        Ok(body.len())
    }
}

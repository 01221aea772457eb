//! Response-side HTTP plumbing.
//!
//! Handlers write through the [`ResponseWriter`] capability rather than an
//! owned response, so decorators can intercept the moment headers are
//! committed. [`SessionResponse`] is the decorator that carries a request's
//! [`CookieBuffer`](crate::cookies::CookieBuffer) and flushes it on that first
//! commit; [`ResponseRecorder`] is an in-memory writer.

mod recorder;
mod response;
mod session_response;

pub use recorder::ResponseRecorder;
pub use response::ResponseWriter;
pub use session_response::SessionResponse;

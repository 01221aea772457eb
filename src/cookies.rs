//! Cookies: the [`Cookie`] model, [`CookieOptions`]-driven construction and the
//! request-scoped [`CookieBuffer`].

mod buffer;
mod cookie;
mod options;

pub use buffer::CookieBuffer;
pub use cookie::request_cookie;
pub use cookie::Cookie;
pub use cookie::SameSite;

pub use crate::config::CookieOptions;

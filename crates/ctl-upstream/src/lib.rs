//! # ctl-upstream
//!
//! Client side of the upstream congregation API.
//!
//! - [`session`] - per-site login, cookie and CSRF token handling
//! - [`service`] - paginated reads of groups, memberships and persons
//! - [`transport`] - the HTTP seam and its `reqwest` implementation
//!
//! All network access goes through a [`Transport`]; [`HttpTransport`] is the
//! production implementation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cookie;
pub mod error;
pub mod service;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cookie::cookie_is_valid;
pub use error::{UpstreamError, UpstreamResult};
pub use service::{id_chunks, page_url, UpstreamService, ID_CHUNK_SIZE, PAGE_LIMIT};
pub use session::{Connection, ConnectionStatus, SessionManager, MAX_LOGIN_FAILURES};
pub use transport::{HttpTransport, Method, Transport, UpstreamRequest, UpstreamResponse};

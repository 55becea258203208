//! Gateway bridge: hosting synchronous, environment-based applications.
//!
//! # Data Flow
//! ```text
//! matched request
//!     → environ.rs (CGI-style variables + body stream)
//!     → adapter.rs (invoke app on the blocking pool)
//!     → start_response.rs (status/headers callback, body buffer)
//!     → status.rs (code or "<code> <reason>" line → StatusCode)
//! ```
//!
//! # Design Decisions
//! - The whole request body is buffered before the app runs
//! - The whole response body is buffered before it is returned
//! - Status is resolved once at the boundary, never re-inspected

pub mod adapter;
pub mod environ;
pub mod start_response;
pub mod status;

pub use adapter::{gateway_fn, GatewayAdapter, GatewayApp};
pub use environ::Environ;
pub use start_response::{BodyWriter, Chunk, ResponseHead, StartResponse};
pub use status::{InvalidStatus, Status};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware layers)
//!     → Controller (dispatch)
//!     → request.rs (scheme/host detection, buffered request context)
//!     → response.rs (fixed responses, header conversion)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{CurrentApp, MountPoint, RequestContext, Transport};
pub use server::HttpServer;

//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → plain: axum::serve on a tokio listener
//!     → tls.rs: rustls handshake via axum-server, tagged Transport::Tls
//!     → Hand off to HTTP layer
//! ```

pub mod tls;

pub use tls::load_tls_config;

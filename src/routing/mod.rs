//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → mount_table.rs (longest-prefix lookup, host-qualified first)
//!     → Return: matched Mount + remaining path, or NoMatch
//!     → url.rs (effective URL rewritten to the remaining path)
//! ```
//!
//! # Design Decisions
//! - Tables are rebuilt on registration, immutable while serving
//! - No regex in hot path (segment stripping only)
//! - Deterministic: most specific mount wins, insertion order is irrelevant

pub mod mount_table;
pub mod url;

pub use self::mount_table::{normalize_prefix, Mount, MountKey, MountTable, Resolved};
pub use self::url::CompatUrl;

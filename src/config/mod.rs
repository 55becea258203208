//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DispatcherConfig (validated, immutable)
//!     → server settings, controller settings, startup mounts
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; mounts change at runtime through the controller
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    DispatcherConfig, ListenerConfig, LogFormat, MountConfig, MountingConfig, ObservabilityConfig,
};
pub use validation::ValidationError;

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect mounts that would collide on the same key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatcherConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::DispatcherConfig;
use crate::routing::normalize_prefix;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}': not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("TLS {field} must not be empty")]
    EmptyTlsPath { field: &'static str },

    #[error("mount #{index} has an empty application name")]
    EmptyAppName { index: usize },

    #[error("mount #{index} has an empty host")]
    EmptyHost { index: usize },

    #[error("mount '{key}' is configured more than once")]
    DuplicateMount { key: String },
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &DispatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::EmptyTlsPath { field: "cert_path" });
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::EmptyTlsPath { field: "key_path" });
        }
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::Zero {
            field: "limits.max_body_size",
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let filter_host = config.dispatcher.host.as_deref();
    let mut seen = HashSet::new();
    for (index, mount) in config.mounts.iter().enumerate() {
        if mount.app.trim().is_empty() {
            errors.push(ValidationError::EmptyAppName { index });
        }
        if mount.hosts.iter().any(|h| h.trim().is_empty()) {
            errors.push(ValidationError::EmptyHost { index });
        }

        let prefix = normalize_prefix(&mount.prefix);
        let hosts: Vec<Option<String>> = if mount.hosts.is_empty() {
            vec![filter_host.map(str::to_ascii_lowercase)]
        } else {
            mount.hosts.iter().map(|h| Some(h.to_ascii_lowercase())).collect()
        };
        for host in hosts {
            let key = format!("{}{}", host.unwrap_or_default(), prefix);
            if !seen.insert(key.clone()) {
                errors.push(ValidationError::DuplicateMount { key });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

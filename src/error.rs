//! Error types shared by the dispatcher subsystems.
//!
//! # Design Decisions
//! - A request that matches no mount is not an error (resolution yields `None`)
//! - A gateway app that never starts its response is answered with a fixed 500,
//!   not an error
//! - Everything else propagates unchanged to the serving runtime, which decides
//!   how to present it

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::dispatch::hooks::HookStage;
use crate::dispatch::application::AppKind;
use crate::gateway::status::InvalidStatus;

/// Boxed error produced by mounted applications and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while dispatching a single request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A gateway app supplied a status that is neither a code nor a `"<code> <reason>"` line.
    #[error("status cannot be turned into a code: {0}")]
    InvalidStatus(String),

    /// The mounted application failed while handling the request.
    #[error("application mounted at '{mount}' failed: {source}")]
    Target {
        mount: String,
        #[source]
        source: BoxError,
    },

    /// A parent hook failed; the rest of the chain was skipped.
    #[error("{stage} hook failed: {source}")]
    Middleware {
        stage: HookStage,
        #[source]
        source: BoxError,
    },

    /// The parent handler failed on the fallback path.
    #[error("parent application failed: {0}")]
    Parent(#[source] BoxError),

    /// The request body could not be buffered.
    #[error("failed to read request body: {0}")]
    Body(String),

    /// The declared request body exceeds the buffering limit.
    #[error("request body of {length} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { length: u64, limit: usize },

    /// The rewritten request target is not a valid URI.
    #[error("invalid rewritten request target '{0}'")]
    Rewrite(String),
}

impl From<InvalidStatus> for DispatchError {
    fn from(err: InvalidStatus) -> Self {
        DispatchError::InvalidStatus(err.0)
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match self {
            DispatchError::Body(_) => StatusCode::BAD_REQUEST,
            DispatchError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, status.canonical_reason().unwrap_or("Error")).into_response()
    }
}

/// Errors raised while mounting applications from configuration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The configuration names an application the catalog does not contain.
    #[error("no application named '{0}' in the catalog")]
    UnknownApp(String),

    /// The configured kind does not match the catalog entry.
    #[error("application '{name}' is a {actual} app, configured as {expected}")]
    KindMismatch {
        name: String,
        expected: AppKind,
        actual: AppKind,
    },
}

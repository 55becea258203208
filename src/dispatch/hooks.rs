//! Parent-level request and response hooks.
//!
//! # Design Decisions
//! - Hooks run strictly in the order they were added
//! - The first hook that produces a response wins; later hooks are skipped
//! - A failing hook stops the chain and fails the request

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;

use crate::dispatch::reply::Reply;
use crate::error::{BoxError, DispatchError};
use crate::http::request::RequestContext;

/// Runs before the mounted application.
#[async_trait]
pub trait RequestHook: Send + Sync + 'static {
    /// Returning a response skips the mounted application entirely.
    async fn on_request(&self, request: &mut RequestContext) -> Result<Option<Response>, BoxError>;
}

/// Runs after the mounted application (or a short-circuiting request hook).
#[async_trait]
pub trait ResponseHook: Send + Sync + 'static {
    /// Returning a response replaces the current reply.
    async fn on_response(
        &self,
        request: &RequestContext,
        reply: &mut Reply,
    ) -> Result<Option<Response>, BoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    Request,
    Response,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::Request => f.write_str("request"),
            HookStage::Response => f.write_str("response"),
        }
    }
}

pub(crate) async fn run_request_hooks(
    hooks: &[Arc<dyn RequestHook>],
    request: &mut RequestContext,
) -> Result<Option<Response>, DispatchError> {
    for hook in hooks {
        let outcome = hook
            .on_request(request)
            .await
            .map_err(|source| DispatchError::Middleware {
                stage: HookStage::Request,
                source,
            })?;
        if outcome.is_some() {
            return Ok(outcome);
        }
    }
    Ok(None)
}

pub(crate) async fn run_response_hooks(
    hooks: &[Arc<dyn ResponseHook>],
    request: &RequestContext,
    reply: &mut Reply,
) -> Result<Option<Response>, DispatchError> {
    for hook in hooks {
        let outcome = hook
            .on_response(request, reply)
            .await
            .map_err(|source| DispatchError::Middleware {
                stage: HookStage::Response,
                source,
            })?;
        if outcome.is_some() {
            return Ok(outcome);
        }
    }
    Ok(None)
}

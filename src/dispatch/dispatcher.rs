//! Per-request dispatch over an immutable mount snapshot.
//!
//! # Data Flow
//! ```text
//! Request
//!     → detect scheme, resolve mount (request parts only)
//!     ├─ no match → parent handler, request untouched
//!     └─ match    → buffer body, rewrite URL to the remaining path
//!                 → parent request hooks (may short-circuit)
//!                 → target (gateway adapter | native child)
//!                 → parent response hooks (may replace the reply)
//!                 → resolved Reply
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;

use crate::dispatch::application::{ParentApp, RegisteredApp, Target};
use crate::dispatch::hooks::{run_request_hooks, run_response_hooks, HookStage};
use crate::dispatch::reply::Reply;
use crate::error::{BoxError, DispatchError};
use crate::gateway::GatewayAdapter;
use crate::http::request::{detect_scheme, request_host, MountPoint, RequestContext};
use crate::observability::metrics;
use crate::routing::{MountTable, Resolved};

/// Mount table type shared by the controller and its snapshots.
pub type Mounts = MountTable<Arc<RegisteredApp>>;

/// An immutable view of the parent and its mounts.
///
/// The controller publishes a fresh `Dispatcher` on every registration
/// change; requests already holding a snapshot keep using it.
#[derive(Debug)]
pub struct Dispatcher {
    parent: Arc<ParentApp>,
    table: Arc<Mounts>,
    body_limit: usize,
}

impl Dispatcher {
    pub fn new(parent: Arc<ParentApp>, table: Arc<Mounts>, body_limit: usize) -> Self {
        Self {
            parent,
            table,
            body_limit,
        }
    }

    pub fn table(&self) -> &Mounts {
        &self.table
    }

    /// Resolve `host` and `path` to the most specific mount.
    pub fn lookup(&self, host: &str, path: &str) -> Option<Resolved<'_, Arc<RegisteredApp>>> {
        self.table.lookup(host, path)
    }

    /// Route `request` to its mount, or to the parent when nothing matches.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Reply, DispatchError> {
        let start = Instant::now();
        let scheme = detect_scheme(&request);
        let (host, _) = request_host(request.headers(), request.uri());

        let Some(resolved) = self.lookup(&host, request.uri().path()) else {
            metrics::record_fallback();
            tracing::trace!(path = %request.uri().path(), "No mount matched, forwarding to parent");
            let reply = self
                .parent
                .handler()
                .handle(request)
                .await
                .map_err(DispatchError::Parent)?;
            return reply.resolve().await.map_err(DispatchError::Parent);
        };

        let app = resolved.mount.app.clone();
        let label = resolved.mount.key.to_string();
        let prefix = resolved.mount.key.prefix().to_string();
        let remaining = resolved.remaining;

        tracing::debug!(
            mount = %label,
            kind = %app.kind(),
            remaining = %remaining,
            "Dispatching to mounted application"
        );

        let mut ctx = RequestContext::from_request(request, scheme, self.body_limit).await?;
        let mut url = ctx.url().clone();
        url.path = remaining.clone();
        ctx.set_url(url);
        ctx.set_mount_point(MountPoint {
            prefix: prefix.clone(),
            remaining,
        });

        let hooks_apply = app.apply_middleware();
        let mut short_circuit = None;
        if hooks_apply && !self.parent.request_hooks().is_empty() {
            ctx.set_current_app(Some(self.parent.name().clone()));
            short_circuit = run_request_hooks(self.parent.request_hooks(), &mut ctx).await?;
        }

        let reply = match short_circuit {
            Some(response) => {
                metrics::record_short_circuit(HookStage::Request);
                tracing::debug!(mount = %label, "Request hook short-circuited the target");
                Reply::from_response(response)
            }
            None => self.call_target(&app, &prefix, &mut ctx).await?,
        };
        let mut reply = resolve_target(reply, &prefix).await?;

        if hooks_apply && !self.parent.response_hooks().is_empty() {
            ctx.set_current_app(Some(self.parent.name().clone()));
            if let Some(response) =
                run_response_hooks(self.parent.response_hooks(), &ctx, &mut reply).await?
            {
                metrics::record_short_circuit(HookStage::Response);
                reply = Reply::from_response(response);
            }
        }
        let reply = resolve_target(reply, &prefix).await?;

        metrics::record_dispatch(&label, app.kind(), start);
        Ok(reply)
    }

    async fn call_target(
        &self,
        app: &RegisteredApp,
        prefix: &str,
        ctx: &mut RequestContext,
    ) -> Result<Reply, DispatchError> {
        match app.target() {
            Target::Gateway(gateway) => {
                let response = GatewayAdapter::new(gateway.clone())
                    .invoke(prefix, ctx.path(), &*ctx)
                    .await?;
                Ok(Reply::Full(response))
            }
            Target::Native(native) => {
                ctx.set_current_app(None);
                let request = ctx.to_request()?;
                native
                    .handle(request)
                    .await
                    .map_err(|source| target_failed(prefix, source))
            }
        }
    }
}

async fn resolve_target(reply: Reply, prefix: &str) -> Result<Reply, DispatchError> {
    reply
        .resolve()
        .await
        .map_err(|source| target_failed(prefix, source))
}

fn target_failed(prefix: &str, source: BoxError) -> DispatchError {
    tracing::error!(mount = %prefix, error = %source, "Mounted application failed");
    DispatchError::Target {
        mount: prefix.to_string(),
        source,
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router whose fallback is the dispatch controller
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Bind server to a plain or TLS listener
//! - Stop accepting and drain on shutdown

use std::net::SocketAddr;
use std::time::Duration;

use axum::{Extension, Router};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::DispatcherConfig;
use crate::dispatch::Controller;
use crate::http::request::Transport;
use crate::lifecycle::wait_for;

/// How long TLS connections may drain after shutdown is triggered.
const TLS_DRAIN_SECS: u64 = 30;

/// HTTP server fronting the dispatch controller.
pub struct HttpServer {
    router: Router,
    config: DispatcherConfig,
    controller: Controller,
}

impl HttpServer {
    /// Create a new HTTP server serving `controller`.
    pub fn new(config: DispatcherConfig, controller: Controller) -> Self {
        let router = Self::build_router(&config, controller.clone());
        Self {
            router,
            config,
            controller,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &DispatcherConfig, controller: Controller) -> Router {
        Router::new()
            .fallback_service(controller)
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mounts = self.controller.mounts().len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr` until `shutdown` fires.
    ///
    /// Requests arriving here carry `Transport::Tls`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            mounts = self.controller.mounts().len(),
            "HTTPS server starting"
        );

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            wait_for(shutdown).await;
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        let app = self.router.layer(Extension(Transport::Tls));
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{MountOptions, ParentApp, ServiceApp};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn server(config: DispatcherConfig) -> HttpServer {
        let parent = ServiceApp::shared(Router::new().fallback(|| async { "parent" }));
        let controller = Controller::new(ParentApp::new("parent", parent));
        controller.register_native(
            ServiceApp::shared(Router::new().fallback(|| async { "child" })),
            "/child",
            MountOptions::new(),
        );
        HttpServer::new(config, controller)
    }

    #[tokio::test]
    async fn test_router_dispatches_and_sets_request_id() {
        let response = server(DispatcherConfig::default())
            .router()
            .oneshot(Request::builder().uri("/child/x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"child");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut config = DispatcherConfig::default();
        config.limits.max_body_size = 4;
        let response = server(config)
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/child/x")
                    .header("content-length", "10")
                    .body(Body::from("0123456789"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}

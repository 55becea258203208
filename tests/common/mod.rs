//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Request;
use axum::Router;
use tokio::net::TcpListener;

use app_dispatcher::config::DispatcherConfig;
use app_dispatcher::{Controller, HttpServer, NativeApp, ParentApp, ServiceApp, Shutdown};

/// A dispatcher serving on an ephemeral local port.
///
/// Dropping it triggers shutdown.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub controller: Controller,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start `controller` behind the full server stack.
pub async fn start(config: DispatcherConfig, controller: Controller) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, controller.clone());
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        controller,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A native app answering every request with `body`.
pub fn text_app(body: &'static str) -> Arc<dyn NativeApp> {
    ServiceApp::shared(Router::new().fallback(move || async move { body }))
}

/// A native app echoing the path and query it received.
#[allow(dead_code)]
pub fn echo_app() -> Arc<dyn NativeApp> {
    ServiceApp::shared(Router::new().fallback(|request: Request<axum::body::Body>| async move {
        format!("echo:{}", request.uri())
    }))
}

/// A parent answering unmatched requests with `parent:<uri>`.
pub fn parent() -> ParentApp {
    let router = Router::new().fallback(|request: Request<axum::body::Body>| async move {
        format!("parent:{}", request.uri())
    });
    ParentApp::new("parent", ServiceApp::shared(router))
}

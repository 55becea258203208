//! app-dispatcher
//!
//! Serves a parent application with child applications mounted under path
//! prefixes.
//!
//! ```text
//!     Client Request
//!         → http::server (request id, timeout, body limit, trace)
//!         → dispatch::Controller (current snapshot)
//!             ├─ /hello   → native child (axum Router)
//!             ├─ /environ → gateway child (synchronous, environment-based)
//!             └─ else     → parent application
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::HeaderValue;
use axum::response::Response;
use axum::{routing::get, Router};
use clap::Parser;
use tokio::net::TcpListener;

use app_dispatcher::config::{load_config, DispatcherConfig, MountConfig};
use app_dispatcher::dispatch::application::AppKind;
use app_dispatcher::gateway::{Environ, StartResponse};
use app_dispatcher::http::RequestContext;
use app_dispatcher::lifecycle::spawn_signal_listener;
use app_dispatcher::net::tls;
use app_dispatcher::observability::{init_logging, init_metrics};
use app_dispatcher::{
    gateway_fn, AppCatalog, BoxError, Controller, ControllerSettings, HttpServer, ParentApp,
    Reply, ResponseHook, ServiceApp, Shutdown,
};

#[derive(Parser, Debug)]
#[command(name = "app-dispatcher", version, about = "Prefix and host based application dispatcher")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

/// Tags every reply from a hooked mount.
struct DispatchedBy;

#[async_trait]
impl ResponseHook for DispatchedBy {
    async fn on_response(
        &self,
        _request: &RequestContext,
        reply: &mut Reply,
    ) -> Result<Option<Response>, BoxError> {
        if let Some(response) = reply.response_mut() {
            response
                .headers_mut()
                .insert("x-dispatched-by", HeaderValue::from_static("app-dispatcher"));
        }
        Ok(None)
    }
}

fn parent_app() -> ParentApp {
    let router = Router::new()
        .route("/", get(|| async { "app-dispatcher parent application" }))
        .route("/health", get(|| async { "ok" }));
    ParentApp::new("parent", ServiceApp::shared(router)).with_response_hook(DispatchedBy)
}

fn catalog() -> AppCatalog {
    let hello = Router::new()
        .route("/", get(|| async { "Hello from a mounted application" }))
        .route(
            "/{name}",
            get(|Path(name): Path<String>| async move { format!("Hello, {}!", name) }),
        );

    let environ = gateway_fn(|environ: Environ, start: &mut StartResponse| {
        let body = serde_json::to_vec_pretty(environ.vars())?;
        start.start(
            "200 OK",
            vec![("Content-Type".to_string(), "application/json".to_string())],
        )?;
        Ok(vec![body.into()])
    });

    AppCatalog::new()
        .with_native("hello", ServiceApp::shared(hello))
        .with_gateway("environ", environ)
}

fn default_mounts() -> Vec<MountConfig> {
    vec![
        MountConfig {
            app: "hello".to_string(),
            prefix: "/hello".to_string(),
            kind: AppKind::Native,
            hosts: Vec::new(),
            apply_middleware: true,
        },
        MountConfig {
            app: "environ".to_string(),
            prefix: "/environ".to_string(),
            kind: AppKind::Gateway,
            hosts: Vec::new(),
            apply_middleware: false,
        },
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => DispatcherConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "app-dispatcher starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        url_prefix = %config.dispatcher.url_prefix,
        filter_host = ?config.dispatcher.host,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let controller = Controller::with_settings(parent_app(), ControllerSettings::from_config(&config));
    let mounts = if config.mounts.is_empty() {
        default_mounts()
    } else {
        config.mounts.clone()
    };
    let catalog = catalog();
    let available: Vec<&str> = catalog.names().collect();
    tracing::debug!(apps = ?available, "Application catalog");
    controller.apply_mounts(&mounts, &catalog)?;
    for mount in controller.mounts() {
        tracing::info!(mount = %mount.key, kind = %mount.kind, "Mount ready");
    }

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let tls = config.listener.tls.clone();
    let server = HttpServer::new(config, controller);
    match tls {
        Some(tls_config) => {
            let rustls = tls::from_config(&tls_config).await?;
            let addr: SocketAddr = server.config().listener.bind_address.parse()?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

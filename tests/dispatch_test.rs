//! End-to-end dispatch scenarios against a running server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::Request;
use axum::response::{IntoResponse, Response};

use app_dispatcher::config::DispatcherConfig;
use app_dispatcher::gateway::{Environ, StartResponse};
use app_dispatcher::http::RequestContext;
use app_dispatcher::{
    gateway_fn, BoxError, Controller, MountOptions, NativeApp, Reply, RequestHook, ResponseHook,
};

mod common;

struct Intercepted;

#[async_trait]
impl ResponseHook for Intercepted {
    async fn on_response(
        &self,
        _request: &RequestContext,
        _reply: &mut Reply,
    ) -> Result<Option<Response>, BoxError> {
        Ok(Some("intercepted".into_response()))
    }
}

struct Ticker;

#[async_trait]
impl NativeApp for Ticker {
    async fn handle(&self, _request: Request<Body>) -> Result<Reply, BoxError> {
        let ticks = futures_util::stream::iter(
            (0..5).map(|i| Ok::<_, std::io::Error>(Bytes::from(format!("tick{};", i)))),
        );
        Ok(Reply::from_response(Response::new(Body::from_stream(ticks))))
    }
}

struct Guard {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RequestHook for Guard {
    async fn on_request(&self, request: &mut RequestContext) -> Result<Option<Response>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.arg("token") == Some("secret") {
            Ok(None)
        } else {
            Ok(Some((axum::http::StatusCode::FORBIDDEN, "denied").into_response()))
        }
    }
}

#[tokio::test]
async fn test_unmounted_path_reaches_parent() {
    let server = common::start(DispatcherConfig::default(), Controller::new(common::parent())).await;
    let client = common::client();

    let res = client.get(server.url("/anything?x=1")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "parent:/anything?x=1");
}

#[tokio::test]
async fn test_post_hook_intercepts_child() {
    let controller = Controller::new(common::parent().with_response_hook(Intercepted));
    controller.register_native(
        common::text_app("child"),
        "/child",
        MountOptions::new().apply_middleware(true),
    );
    controller.register_native(common::text_app("plain"), "/plain", MountOptions::new());
    let server = common::start(DispatcherConfig::default(), controller).await;
    let client = common::client();

    let res = client.get(server.url("/child/anything")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "intercepted");

    let res = client.get(server.url("/plain/anything")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "plain");
}

#[tokio::test]
async fn test_pre_hook_short_circuits_child() {
    let calls = Arc::new(AtomicUsize::new(0));
    let controller = Controller::new(common::parent().with_request_hook(Guard {
        calls: calls.clone(),
    }));
    controller.register_native(
        common::echo_app(),
        "/guarded",
        MountOptions::new().apply_middleware(true),
    );
    let server = common::start(DispatcherConfig::default(), controller).await;
    let client = common::client();

    let res = client.get(server.url("/guarded/data")).send().await.unwrap();
    assert_eq!(res.status(), 403);
    assert_eq!(res.text().await.unwrap(), "denied");

    let res = client
        .get(server.url("/guarded/data?token=secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "echo:/data?token=secret");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_gateway_round_trip() {
    let controller = Controller::new(common::parent());
    controller.register_gateway(
        gateway_fn(|mut environ: Environ, start: &mut StartResponse| {
            let body = environ.read_body()?;
            let summary = format!(
                "{} {}{} q={} body={}",
                environ.get("REQUEST_METHOD").unwrap_or(""),
                environ.get("SCRIPT_NAME").unwrap_or(""),
                environ.get("PATH_INFO").unwrap_or(""),
                environ.get("QUERY_STRING").unwrap_or(""),
                String::from_utf8_lossy(&body),
            );
            let mut write = start.start(
                "200 OK",
                vec![("X-Gateway".to_string(), "yes".to_string())],
            )?;
            write.write("a");
            Ok(vec!["b|".into(), summary.into()])
        }),
        "/legacy",
        MountOptions::new(),
    );
    controller.register_gateway(
        gateway_fn(|_environ: Environ, start: &mut StartResponse| {
            start.start("404 Not Found", Vec::new())?;
            Ok(vec!["missing".into()])
        }),
        "/gone",
        MountOptions::new(),
    );
    let server = common::start(DispatcherConfig::default(), controller).await;
    let client = common::client();

    let res = client
        .post(server.url("/legacy/run?x=1"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-gateway"], "yes");
    assert_eq!(
        res.text().await.unwrap(),
        "ab|POST /legacy/run q=x=1 body=payload"
    );

    let res = client.get(server.url("/gone/x")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "missing");
}

#[tokio::test]
async fn test_host_qualified_mount_preferred() {
    let controller = Controller::new(common::parent());
    controller.register_native(common::text_app("any-host"), "/x", MountOptions::new());
    controller.register_native(
        common::text_app("example"),
        "/x",
        MountOptions::new().host("example.com"),
    );
    let server = common::start(DispatcherConfig::default(), controller).await;
    let client = common::client();

    let res = client
        .get(server.url("/x/page"))
        .header("host", "example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "example");

    let res = client
        .get(server.url("/x/page"))
        .header("host", "other.org")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "any-host");
}

#[tokio::test]
async fn test_runtime_register_and_unregister() {
    let server = common::start(DispatcherConfig::default(), Controller::new(common::parent())).await;
    let client = common::client();

    let res = client.get(server.url("/late/a")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "parent:/late/a");

    let app = common::echo_app();
    server
        .controller
        .register_native(app.clone(), "/late", MountOptions::new());
    let res = client.get(server.url("/late/a")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "echo:/a");

    assert_eq!(server.controller.unregister_application(&app, true), 1);
    let res = client.get(server.url("/late/a")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "parent:/late/a");
}

#[tokio::test]
async fn test_global_url_prefix_from_config() {
    let mut config = DispatcherConfig::default();
    config.dispatcher.url_prefix = "/apps".into();
    let controller = Controller::with_settings(
        common::parent(),
        app_dispatcher::ControllerSettings::from_config(&config),
    );
    controller.register_native(common::echo_app(), "/tool", MountOptions::new());
    let server = common::start(config, controller).await;
    let client = common::client();

    let res = client.get(server.url("/apps/tool/run")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "echo:/run");

    let res = client.get(server.url("/tool/run")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "parent:/tool/run");
}

#[tokio::test]
async fn test_streamed_reply_reaches_client() {
    let controller = Controller::new(common::parent().with_response_hook(Intercepted));
    controller.register_native(Arc::new(Ticker), "/ticks", MountOptions::new());
    let server = common::start(DispatcherConfig::default(), controller).await;

    let res = common::client().get(server.url("/ticks")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.content_length().is_none());
    assert_eq!(res.text().await.unwrap(), "tick0;tick1;tick2;tick3;tick4;");
}

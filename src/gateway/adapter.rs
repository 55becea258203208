//! Bridge from async request handling to synchronous gateway apps.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → Environ::from_request (SCRIPT_NAME = mount prefix, PATH_INFO = remaining)
//!     → app.call(environ, &mut start_response)   [blocking pool]
//!     → start_response.finish(returned chunks)
//!     → Response (or fixed 500 when the response was never started)
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::http::Response;

use crate::error::{BoxError, DispatchError};
use crate::gateway::environ::Environ;
use crate::gateway::start_response::{Chunk, StartResponse};
use crate::gateway::status::InvalidStatus;
use crate::http::request::RequestContext;
use crate::http::response::gateway_call_error;

/// A synchronous, environment-based application.
pub trait GatewayApp: Send + Sync + 'static {
    /// Handle one request. The app must call `start_response.start` before
    /// returning; the returned chunks are appended to the body in order.
    fn call(&self, environ: Environ, start_response: &mut StartResponse) -> Result<Vec<Chunk>, BoxError>;
}

impl<F> GatewayApp for F
where
    F: Fn(Environ, &mut StartResponse) -> Result<Vec<Chunk>, BoxError> + Send + Sync + 'static,
{
    fn call(&self, environ: Environ, start_response: &mut StartResponse) -> Result<Vec<Chunk>, BoxError> {
        self(environ, start_response)
    }
}

/// Wrap a closure as a shareable gateway app.
pub fn gateway_fn<F>(f: F) -> Arc<dyn GatewayApp>
where
    F: Fn(Environ, &mut StartResponse) -> Result<Vec<Chunk>, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Invokes a gateway app for a matched request.
#[derive(Clone)]
pub struct GatewayAdapter {
    app: Arc<dyn GatewayApp>,
}

impl GatewayAdapter {
    pub fn new(app: Arc<dyn GatewayApp>) -> Self {
        Self { app }
    }

    /// Run the app for `request` mounted at `script_name`.
    ///
    /// The app runs on the blocking pool. A panic inside the app is resumed
    /// on the calling task.
    pub async fn invoke(
        &self,
        script_name: &str,
        path_info: &str,
        request: &RequestContext,
    ) -> Result<Response<Body>, DispatchError> {
        let environ = Environ::from_request(script_name, path_info, request);
        let app = self.app.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let mut start_response = StartResponse::new();
            let result = app.call(environ, &mut start_response);
            (start_response, result)
        })
        .await;

        let (start_response, result) = match joined {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => {
                return Err(DispatchError::Target {
                    mount: script_name.to_string(),
                    source: Box::new(err),
                })
            }
        };

        let chunks = match result {
            Ok(chunks) => chunks,
            Err(source) => {
                if let Some(invalid) = start_response.invalid_status() {
                    return Err(invalid.clone().into());
                }
                if let Some(invalid) = source.downcast_ref::<InvalidStatus>() {
                    return Err(invalid.clone().into());
                }
                tracing::error!(mount = %script_name, error = %source, "Gateway application failed");
                return Err(DispatchError::Target {
                    mount: script_name.to_string(),
                    source,
                });
            }
        };

        match start_response.finish(chunks)? {
            Some(response) => Ok(response),
            None => {
                tracing::warn!(mount = %script_name, "Gateway application never started its response");
                Ok(gateway_call_error())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::environ::{PATH_INFO, SCRIPT_NAME};
    use axum::http::{Request, StatusCode};

    async fn context() -> RequestContext {
        let request = Request::builder()
            .uri("/app/run")
            .body(Body::from("in"))
            .unwrap();
        RequestContext::from_request(request, "http", 1024).await.unwrap()
    }

    async fn body_of(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let app = gateway_fn(|_environ: Environ, start: &mut StartResponse| {
            start.start(200u16, vec![("Content-Type".into(), "text/plain".into())])?;
            Ok(vec![b"a".into(), b"b".into()])
        });
        let response = GatewayAdapter::new(app)
            .invoke("/app", "/run", &context().await)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "ab");
    }

    #[tokio::test]
    async fn test_status_line_and_environ() {
        let app = gateway_fn(|mut environ: Environ, start: &mut StartResponse| {
            let body = environ.read_body()?;
            let line = format!(
                "{}|{}|{}",
                environ.get(SCRIPT_NAME).unwrap_or(""),
                environ.get(PATH_INFO).unwrap_or(""),
                String::from_utf8_lossy(&body)
            );
            start.start("404 Not Found", Vec::new())?;
            Ok(vec![line.into()])
        });
        let response = GatewayAdapter::new(app)
            .invoke("/app", "/run", &context().await)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, "/app|/run|in");
    }

    #[tokio::test]
    async fn test_never_started_is_fixed_500() {
        let app = gateway_fn(|_environ: Environ, _start: &mut StartResponse| Ok(vec!["ignored".into()]));
        let response = GatewayAdapter::new(app)
            .invoke("/app", "/run", &context().await)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await, "WSGI call error.");
    }

    #[tokio::test]
    async fn test_invalid_status_surfaces_even_if_swallowed() {
        let app = gateway_fn(|_environ: Environ, start: &mut StartResponse| {
            let _ = start.start("OK", Vec::new());
            Ok(Vec::new())
        });
        let err = GatewayAdapter::new(app)
            .invoke("/app", "/run", &context().await)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidStatus(_)));
    }

    #[tokio::test]
    async fn test_app_error_propagates() {
        let app = gateway_fn(|_environ: Environ, _start: &mut StartResponse| Err("boom".into()));
        let err = GatewayAdapter::new(app)
            .invoke("/app", "/run", &context().await)
            .await
            .unwrap_err();
        match err {
            DispatchError::Target { mount, source } => {
                assert_eq!(mount, "/app");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

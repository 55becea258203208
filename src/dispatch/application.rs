//! Mounted applications and the parent application.
//!
//! # Responsibilities
//! - Define the native application contract (`NativeApp`)
//! - Adapt any `tower::Service` (e.g. an `axum::Router`) to that contract
//! - Describe registered applications and their identity
//! - Hold the parent's original handler and its hooks

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tower::{Service, ServiceExt};

use crate::dispatch::hooks::{RequestHook, ResponseHook};
use crate::dispatch::reply::Reply;
use crate::error::BoxError;
use crate::gateway::GatewayApp;

/// An application speaking the native async request/response contract.
#[async_trait]
pub trait NativeApp: Send + Sync + 'static {
    async fn handle(&self, request: Request<Body>) -> Result<Reply, BoxError>;
}

/// Adapts a `tower::Service` to `NativeApp`.
#[derive(Debug, Clone)]
pub struct ServiceApp<S> {
    service: S,
}

impl<S> ServiceApp<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Shorthand for `Arc::new(ServiceApp::new(service))`.
    pub fn shared(service: S) -> Arc<dyn NativeApp>
    where
        Self: NativeApp,
    {
        Arc::new(Self::new(service))
    }
}

#[async_trait]
impl<S> NativeApp for ServiceApp<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    async fn handle(&self, request: Request<Body>) -> Result<Reply, BoxError> {
        let response = self.service.clone().oneshot(request).await.map_err(Into::into)?;
        Ok(Reply::from_response(response))
    }
}

/// Which calling convention a mounted application speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    Native,
    Gateway,
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppKind::Native => f.write_str("native"),
            AppKind::Gateway => f.write_str("gateway"),
        }
    }
}

/// The handler behind a mount.
#[derive(Clone)]
pub enum Target {
    Native(Arc<dyn NativeApp>),
    Gateway(Arc<dyn GatewayApp>),
}

impl Target {
    pub fn kind(&self) -> AppKind {
        match self {
            Target::Native(_) => AppKind::Native,
            Target::Gateway(_) => AppKind::Gateway,
        }
    }

    pub fn id(&self) -> AppId {
        match self {
            Target::Native(app) => AppId::from(app),
            Target::Gateway(app) => AppId::from(app),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Target")
            .field(&self.kind())
            .field(&self.id())
            .finish()
    }
}

/// Identity of an application instance: the address of its shared allocation.
///
/// Mounting the same `Arc` twice yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId(usize);

impl AppId {
    fn of<T: ?Sized>(app: &Arc<T>) -> Self {
        AppId(Arc::as_ptr(app) as *const () as usize)
    }
}

impl From<&Arc<dyn NativeApp>> for AppId {
    fn from(app: &Arc<dyn NativeApp>) -> Self {
        AppId::of(app)
    }
}

impl From<&Arc<dyn GatewayApp>> for AppId {
    fn from(app: &Arc<dyn GatewayApp>) -> Self {
        AppId::of(app)
    }
}

impl From<&RegisteredApp> for AppId {
    fn from(app: &RegisteredApp) -> Self {
        app.id()
    }
}

impl From<&Arc<RegisteredApp>> for AppId {
    fn from(app: &Arc<RegisteredApp>) -> Self {
        app.id()
    }
}

/// A mounted application descriptor. Immutable once registered.
#[derive(Debug)]
pub struct RegisteredApp {
    target: Target,
    apply_middleware: bool,
    seq: u64,
}

impl RegisteredApp {
    pub(crate) fn new(target: Target, apply_middleware: bool, seq: u64) -> Self {
        Self {
            target,
            apply_middleware,
            seq,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn kind(&self) -> AppKind {
        self.target.kind()
    }

    pub fn id(&self) -> AppId {
        self.target.id()
    }

    /// Whether the parent's hooks run around this application.
    pub fn apply_middleware(&self) -> bool {
        self.apply_middleware
    }

    /// Registration order; lower registered earlier.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// The primary application that receives everything no mount claims.
pub struct ParentApp {
    name: Arc<str>,
    handler: Arc<dyn NativeApp>,
    request_hooks: Vec<Arc<dyn RequestHook>>,
    response_hooks: Vec<Arc<dyn ResponseHook>>,
}

impl ParentApp {
    pub fn new(name: impl Into<Arc<str>>, handler: Arc<dyn NativeApp>) -> Self {
        Self {
            name: name.into(),
            handler,
            request_hooks: Vec::new(),
            response_hooks: Vec::new(),
        }
    }

    /// Append a pre-request hook; hooks run in the order added.
    pub fn with_request_hook(mut self, hook: impl RequestHook) -> Self {
        self.request_hooks.push(Arc::new(hook));
        self
    }

    /// Append a post-response hook; hooks run in the order added.
    pub fn with_response_hook(mut self, hook: impl ResponseHook) -> Self {
        self.response_hooks.push(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// The parent's own request handler, never wrapped by a dispatcher.
    pub fn handler(&self) -> &Arc<dyn NativeApp> {
        &self.handler
    }

    pub fn request_hooks(&self) -> &[Arc<dyn RequestHook>] {
        &self.request_hooks
    }

    pub fn response_hooks(&self) -> &[Arc<dyn ResponseHook>] {
        &self.response_hooks
    }
}

impl fmt::Debug for ParentApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentApp")
            .field("name", &self.name)
            .field("request_hooks", &self.request_hooks.len())
            .field("response_hooks", &self.response_hooks.len())
            .finish()
    }
}

/// Named applications that configuration can mount.
#[derive(Debug, Clone, Default)]
pub struct AppCatalog {
    apps: HashMap<String, Target>,
}

impl AppCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native(mut self, name: impl Into<String>, app: Arc<dyn NativeApp>) -> Self {
        self.apps.insert(name.into(), Target::Native(app));
        self
    }

    pub fn with_gateway(mut self, name: impl Into<String>, app: Arc<dyn GatewayApp>) -> Self {
        self.apps.insert(name.into(), Target::Gateway(app));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.apps.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.apps.keys().map(String::as_str)
    }
}

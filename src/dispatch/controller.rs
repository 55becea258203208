//! Registration API and the service handed to the HTTP server.
//!
//! # Responsibilities
//! - Own the parent application and the authoritative mount table
//! - Compute mount keys from global settings and per-mount options
//! - Publish an immutable `Dispatcher` snapshot after every change
//! - Serve requests as a `tower::Service` over the current snapshot
//!
//! # Design Decisions
//! - Readers never lock: each request loads the snapshot once
//! - Writers serialize on a mutex and publish a brand new snapshot
//! - The parent handler is held by the controller, never replaced

use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use tower::Service;

use crate::config::{DispatcherConfig, MountConfig};
use crate::dispatch::application::{
    AppCatalog, AppId, AppKind, NativeApp, ParentApp, RegisteredApp, Target,
};
use crate::dispatch::dispatcher::{Dispatcher, Mounts};
use crate::dispatch::reply::Reply;
use crate::error::{DispatchError, RegistrationError};
use crate::gateway::GatewayApp;
use crate::observability::metrics;
use crate::routing::{normalize_prefix, MountKey};

/// Settings applied to every registration.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Prepended to every mount prefix.
    pub url_prefix: String,
    /// Host for mounts registered without one; also enables host matching.
    pub filter_host: Option<String>,
    /// Largest request body buffered for a mounted application.
    pub body_limit: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            url_prefix: String::new(),
            filter_host: None,
            body_limit: 2 * 1024 * 1024,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self {
            url_prefix: config.dispatcher.url_prefix.clone(),
            filter_host: config
                .dispatcher
                .host
                .clone()
                .filter(|h| !h.is_empty()),
            body_limit: config.limits.max_body_size,
        }
    }
}

/// Per-registration options.
#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    hosts: Vec<String>,
    apply_middleware: bool,
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount under `host` (in addition to any hosts already given).
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    /// Mount once under each of `hosts`.
    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts.extend(hosts.into_iter().map(Into::into));
        self
    }

    /// Run the parent's hooks around the mounted application.
    pub fn apply_middleware(mut self, apply: bool) -> Self {
        self.apply_middleware = apply;
        self
    }
}

/// A mount as reported by [`Controller::mounts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub key: MountKey,
    pub kind: AppKind,
    pub apply_middleware: bool,
}

struct Registry {
    table: Mounts,
    next_seq: u64,
}

struct Inner {
    parent: Arc<ParentApp>,
    settings: ControllerSettings,
    registry: Mutex<Registry>,
    current: ArcSwap<Dispatcher>,
}

/// Entry point for every request and owner of the mount registrations.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    pub fn new(parent: ParentApp) -> Self {
        Self::with_settings(parent, ControllerSettings::default())
    }

    pub fn with_settings(parent: ParentApp, settings: ControllerSettings) -> Self {
        let parent = Arc::new(parent);
        let mut table = Mounts::new();
        if let Some(host) = &settings.filter_host {
            table.pin_host(host);
        }
        let current = ArcSwap::from_pointee(Dispatcher::new(
            parent.clone(),
            Arc::new(table.clone()),
            settings.body_limit,
        ));
        Self {
            inner: Arc::new(Inner {
                parent,
                settings,
                registry: Mutex::new(Registry { table, next_seq: 0 }),
                current,
            }),
        }
    }

    pub fn parent(&self) -> &Arc<ParentApp> {
        &self.inner.parent
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.inner.settings
    }

    /// The dispatcher currently serving requests.
    pub fn snapshot(&self) -> Arc<Dispatcher> {
        self.inner.current.load_full()
    }

    /// Mount a native application at `prefix`.
    pub fn register_native(
        &self,
        app: Arc<dyn NativeApp>,
        prefix: &str,
        options: MountOptions,
    ) -> Arc<RegisteredApp> {
        self.register(Target::Native(app), prefix, options)
    }

    /// Mount a gateway application at `prefix`.
    pub fn register_gateway(
        &self,
        app: Arc<dyn GatewayApp>,
        prefix: &str,
        options: MountOptions,
    ) -> Arc<RegisteredApp> {
        self.register(Target::Gateway(app), prefix, options)
    }

    /// Mount `target` at `prefix`, once per configured host.
    ///
    /// An existing mount under the same key is replaced.
    pub fn register(&self, target: Target, prefix: &str, options: MountOptions) -> Arc<RegisteredApp> {
        let mut registry = self.lock();
        let registered = self.insert(&mut registry, target, prefix, options);
        self.publish(&registry);
        registered
    }

    /// Mount every configured application from `catalog`.
    ///
    /// Nothing is mounted unless every entry resolves.
    pub fn apply_mounts(
        &self,
        mounts: &[MountConfig],
        catalog: &AppCatalog,
    ) -> Result<Vec<Arc<RegisteredApp>>, RegistrationError> {
        let mut resolved = Vec::with_capacity(mounts.len());
        for mount in mounts {
            let target = catalog
                .get(&mount.app)
                .ok_or_else(|| RegistrationError::UnknownApp(mount.app.clone()))?;
            if target.kind() != mount.kind {
                return Err(RegistrationError::KindMismatch {
                    name: mount.app.clone(),
                    expected: mount.kind,
                    actual: target.kind(),
                });
            }
            resolved.push((target.clone(), mount));
        }

        let mut registry = self.lock();
        let registered = resolved
            .into_iter()
            .map(|(target, mount)| {
                let options = MountOptions::new()
                    .hosts(mount.hosts.iter().cloned())
                    .apply_middleware(mount.apply_middleware);
                self.insert(&mut registry, target, &mount.prefix, options)
            })
            .collect();
        self.publish(&registry);
        Ok(registered)
    }

    /// Remove mounts of `app`: the earliest-registered one, or all of them.
    ///
    /// Returns how many mounts were removed.
    pub fn unregister_application(&self, app: impl Into<AppId>, all: bool) -> usize {
        let id = app.into();
        let mut registry = self.lock();

        let removed = if all {
            registry.table.remove_where(|m| m.app.id() == id)
        } else {
            let first = registry
                .table
                .iter()
                .filter(|m| m.app.id() == id)
                .min_by(|a, b| {
                    (a.app.seq(), a.key.lookup()).cmp(&(b.app.seq(), b.key.lookup()))
                })
                .map(|m| m.key.clone());
            first
                .and_then(|key| registry.table.remove(&key))
                .into_iter()
                .collect()
        };

        for mount in &removed {
            tracing::info!(mount = %mount.key, "Unmounted application");
        }
        if !removed.is_empty() {
            self.publish(&registry);
        }
        removed.len()
    }

    /// Remove the mount at `prefix` under the global host and URL prefix.
    ///
    /// Returns whether a mount was removed; absence is not an error.
    pub fn unregister_prefix(&self, prefix: &str) -> bool {
        self.unregister_key(self.mount_key(None, prefix))
    }

    /// Remove the mount at `prefix` under `host`.
    pub fn unregister_host_prefix(&self, host: &str, prefix: &str) -> bool {
        self.unregister_key(self.mount_key(Some(host), prefix))
    }

    /// Current mounts, ordered by key.
    pub fn mounts(&self) -> Vec<MountInfo> {
        let mut mounts: Vec<MountInfo> = self
            .snapshot()
            .table()
            .iter()
            .map(|m| MountInfo {
                key: m.key.clone(),
                kind: m.app.kind(),
                apply_middleware: m.app.apply_middleware(),
            })
            .collect();
        mounts.sort_by_key(|m| m.key.lookup());
        mounts
    }

    /// Dispatch `request` against the current snapshot.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Reply, DispatchError> {
        let snapshot = self.snapshot();
        snapshot.dispatch(request).await
    }

    fn insert(
        &self,
        registry: &mut Registry,
        target: Target,
        prefix: &str,
        options: MountOptions,
    ) -> Arc<RegisteredApp> {
        let seq = registry.next_seq;
        registry.next_seq += 1;
        let registered = Arc::new(RegisteredApp::new(target, options.apply_middleware, seq));

        let keys: Vec<MountKey> = if options.hosts.is_empty() {
            vec![self.mount_key(None, prefix)]
        } else {
            options
                .hosts
                .iter()
                .map(|host| self.mount_key(Some(host), prefix))
                .collect()
        };
        for key in keys {
            tracing::info!(
                mount = %key,
                kind = %registered.kind(),
                apply_middleware = registered.apply_middleware(),
                "Mounted application"
            );
            if let Some(previous) = registry.table.insert(key, registered.clone()) {
                tracing::debug!(mount = %previous.key, "Replaced existing mount");
            }
        }
        registered
    }

    fn unregister_key(&self, key: MountKey) -> bool {
        let mut registry = self.lock();
        match registry.table.remove(&key) {
            Some(mount) => {
                tracing::info!(mount = %mount.key, "Unmounted application");
                self.publish(&registry);
                true
            }
            None => {
                tracing::debug!(mount = %key, "No mount to remove");
                false
            }
        }
    }

    fn mount_key(&self, host: Option<&str>, prefix: &str) -> MountKey {
        let settings = &self.inner.settings;
        let host = host.or(settings.filter_host.as_deref());
        let prefix = format!(
            "{}{}",
            normalize_prefix(&settings.url_prefix),
            normalize_prefix(prefix)
        );
        MountKey::new(host, &prefix)
    }

    fn publish(&self, registry: &Registry) {
        let table = Arc::new(registry.table.clone());
        metrics::record_mounts(table.len());
        self.inner.current.store(Arc::new(Dispatcher::new(
            self.inner.parent.clone(),
            table,
            self.inner.settings.body_limit,
        )));
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("parent", &self.inner.parent)
            .field("settings", &self.inner.settings)
            .field("mounts", &self.snapshot().table().len())
            .finish()
    }
}

impl Service<Request<Body>> for Controller {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let controller = self.clone();
        Box::pin(async move {
            match controller.dispatch(request).await {
                Ok(reply) => Ok(reply.into_response()),
                Err(err) => {
                    tracing::error!(error = %err, "Dispatch failed");
                    Ok(err.into_response())
                }
            }
        })
    }
}

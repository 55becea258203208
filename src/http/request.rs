//! Request inspection and the dispatch request context.
//!
//! # Responsibilities
//! - Detect the effective scheme (ws / https / http)
//! - Extract the routing-relevant host and port
//! - Buffer a matched request and expose its rewritten URL
//! - Rebuild a `Request` for native children
//!
//! # Design Decisions
//! - Scheme detection never fails a request; anything unknown is `http`
//! - Query arguments are parsed lazily and re-parsed after every URL rewrite
//! - The unmatched path never touches this module's context type

use std::sync::{Arc, OnceLock};

use axum::body::{Body, Bytes};
use axum::http::uri::Authority;
use axum::http::{header, Extensions, HeaderMap, Method, Request, Uri, Version};

use crate::error::DispatchError;
use crate::routing::CompatUrl;

/// How the connection carrying a request was established.
///
/// Inserted as a request extension by the TLS listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Tls,
}

/// Where a matched request was mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    /// Fully qualified mount prefix (the gateway `SCRIPT_NAME`).
    pub prefix: String,
    /// Path below the prefix (the gateway `PATH_INFO`).
    pub remaining: String,
}

/// Application currently associated with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentApp(pub Arc<str>);

/// Effective scheme of a request.
pub fn detect_scheme<B>(request: &Request<B>) -> &'static str {
    let upgrade = request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok());
    if upgrade.is_some_and(|v| v.eq_ignore_ascii_case("websocket")) {
        return "ws";
    }
    let tls = matches!(request.extensions().get::<Transport>(), Some(Transport::Tls))
        || request.uri().scheme_str() == Some("https");
    if tls {
        "https"
    } else {
        "http"
    }
}

/// Host name and port used for host-qualified matching.
///
/// Taken from the `Host` header, falling back to the URI authority
/// (HTTP/2 requests carry `:authority` instead). An unparseable port is
/// dropped rather than failing the request.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> (String, Option<u16>) {
    let raw = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default();

    let (name, port) = split_authority(&raw);
    (name, port.or(uri.port_u16()))
}

/// Split a `Host` value into name and port.
///
/// Bracketed IPv6 literals keep their brackets (`[::1]:8080` → `[::1]`,
/// `8080`). A value that is not a valid authority is returned whole.
pub fn split_authority(raw: &str) -> (String, Option<u16>) {
    match raw.parse::<Authority>() {
        Ok(authority) => (authority.host().to_string(), authority.port_u16()),
        Err(_) => (raw.to_string(), None),
    }
}

/// A buffered request routed to a mounted application.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    original_uri: Uri,
    body: Bytes,
    url: CompatUrl,
    args: OnceLock<Vec<(String, String)>>,
    mount: Option<MountPoint>,
    current_app: Option<Arc<str>>,
}

impl RequestContext {
    /// Buffer `request` (up to `limit` bytes of body) into a context.
    pub async fn from_request(
        request: Request<Body>,
        scheme: &str,
        limit: usize,
    ) -> Result<Self, DispatchError> {
        let (parts, body) = request.into_parts();
        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(length) = declared.filter(|&len| len > limit as u64) {
            return Err(DispatchError::PayloadTooLarge { length, limit });
        }
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| DispatchError::Body(e.to_string()))?;
        let (host, port) = request_host(&parts.headers, &parts.uri);
        let url = CompatUrl::from_request(scheme, &host, port, &parts.uri);

        Ok(Self {
            method: parts.method,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            original_uri: parts.uri,
            body,
            url,
            args: OnceLock::new(),
            mount: None,
            current_app: None,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Case-insensitive header lookup; non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// URI the request arrived with, before any rewrite.
    pub fn original_uri(&self) -> &Uri {
        &self.original_uri
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Effective URL seen by hooks and children.
    pub fn url(&self) -> &CompatUrl {
        &self.url
    }

    /// Replace the effective URL; parsed query arguments are discarded.
    pub fn set_url(&mut self, url: CompatUrl) {
        self.url = url;
        self.args = OnceLock::new();
    }

    pub fn path(&self) -> &str {
        &self.url.path
    }

    pub fn query_string(&self) -> &str {
        self.url.query_str()
    }

    /// Decoded query arguments of the effective URL, in order.
    pub fn args(&self) -> &[(String, String)] {
        self.args.get_or_init(|| {
            url::form_urlencoded::parse(self.url.query_str().as_bytes())
                .into_owned()
                .collect()
        })
    }

    /// First value of query argument `name`.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn mount_point(&self) -> Option<&MountPoint> {
        self.mount.as_ref()
    }

    pub fn set_mount_point(&mut self, mount: MountPoint) {
        self.mount = Some(mount);
    }

    pub fn current_app(&self) -> Option<&str> {
        self.current_app.as_deref()
    }

    pub fn set_current_app(&mut self, app: Option<Arc<str>>) {
        self.current_app = app;
    }

    /// Rebuild a request carrying the effective URL, for a native child.
    ///
    /// The mount point and current application travel as extensions.
    pub fn to_request(&self) -> Result<Request<Body>, DispatchError> {
        let target = self.url.request_target();
        let uri: Uri = target
            .parse()
            .map_err(|_| DispatchError::Rewrite(target.clone()))?;

        let mut extensions = self.extensions.clone();
        extensions.remove::<CurrentApp>();
        if let Some(app) = &self.current_app {
            extensions.insert(CurrentApp(app.clone()));
        }
        if let Some(mount) = &self.mount {
            extensions.insert(mount.clone());
        }

        let mut request = Request::new(Body::from(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = uri;
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        *request.extensions_mut() = extensions;
        Ok(request)
    }
}

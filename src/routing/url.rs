//! Writable request URL.
//!
//! `http::Uri` is immutable and cannot represent a path that is relative to
//! a mount point, so the dispatcher tracks the effective URL of a matched
//! request in this type and rebuilds a `Uri` from it when handing the request
//! to a native child.

use std::fmt;

use axum::http::Uri;
use url::Url;

/// A URL whose components can all be replaced after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatUrl {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
    pub userinfo: Option<String>,
}

impl CompatUrl {
    /// Parse an absolute URL.
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(input)?;
        Ok(Self::from(&parsed))
    }

    /// Build from the pieces the dispatcher has at hand for an inbound request.
    pub fn from_request(scheme: &str, host: &str, port: Option<u16>, uri: &Uri) -> Self {
        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            fragment: None,
            userinfo: None,
        }
    }

    /// Origin-form request target (`/path?query`).
    ///
    /// An empty path (request for the mount point itself) is rendered as `/`.
    pub fn request_target(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        match &self.query {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        }
    }

    /// Query string, empty when absent.
    pub fn query_str(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

impl From<&Url> for CompatUrl {
    fn from(url: &Url) -> Self {
        let userinfo = match (url.username(), url.password()) {
            ("", None) => None,
            (user, None) => Some(user.to_string()),
            (user, Some(password)) => Some(format!("{}:{}", user, password)),
        };
        Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or("").to_string(),
            port: url.port(),
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
            fragment: url.fragment().map(str::to_string),
            userinfo,
        }
    }
}

impl fmt::Display for CompatUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(userinfo) = &self.userinfo {
            write!(f, "{}@", userinfo)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

//! Call environment handed to gateway apps.
//!
//! # Responsibilities
//! - Derive the CGI-style variables from a matched request
//! - Expose the buffered request body as a readable stream
//!
//! # Design Decisions
//! - Host and port come from the effective URL, then the `Host` header,
//!   then `localhost:80`
//! - `CONTENT_LENGTH` is only present when the request carried it
//! - Remaining headers are exported as `HTTP_*` variables

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use axum::body::Bytes;
use axum::http::{header, Version};

use crate::http::request::{split_authority, RequestContext};

pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const PATH_INFO: &str = "PATH_INFO";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const HTTP_HOST: &str = "HTTP_HOST";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const URL_SCHEME: &str = "wsgi.url_scheme";

const DEFAULT_HOST: &str = "localhost:80";
const DEFAULT_PORT: &str = "80";
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Environment variables plus the request body stream.
#[derive(Debug, Clone, Default)]
pub struct Environ {
    vars: BTreeMap<String, String>,
    input: Cursor<Bytes>,
}

impl Environ {
    /// Empty environment with the given body.
    pub fn new(body: Bytes) -> Self {
        Self {
            vars: BTreeMap::new(),
            input: Cursor::new(body),
        }
    }

    /// Environment for `request` mounted at `script_name`.
    pub fn from_request(script_name: &str, path_info: &str, request: &RequestContext) -> Self {
        let mut environ = Self::new(request.body().clone());
        let url = request.url();

        let (server_name, port) = if !url.host.is_empty() {
            (url.host.clone(), url.port)
        } else {
            split_authority(request.header(header::HOST.as_str()).unwrap_or(DEFAULT_HOST))
        };
        let host = match port {
            Some(port) => format!("{}:{}", server_name, port),
            None => server_name.clone(),
        };
        let server_port = port
            .map(|p| p.to_string())
            .unwrap_or_else(|| DEFAULT_PORT.to_string());

        environ.set(SCRIPT_NAME, script_name);
        environ.set(PATH_INFO, path_info);
        environ.set(
            CONTENT_TYPE,
            request
                .header(header::CONTENT_TYPE.as_str())
                .unwrap_or(DEFAULT_CONTENT_TYPE),
        );
        if let Some(length) = request.header(header::CONTENT_LENGTH.as_str()) {
            environ.set(CONTENT_LENGTH, length);
        }
        environ.set(SERVER_NAME, server_name);
        environ.set(SERVER_PORT, server_port);
        environ.set(SERVER_PROTOCOL, protocol(request.version()));
        environ.set(HTTP_HOST, host);
        environ.set(QUERY_STRING, request.query_string());
        environ.set(REQUEST_METHOD, request.method().as_str());
        environ.set(URL_SCHEME, url_scheme(&url.scheme));

        for (name, value) in request.headers() {
            if *name == header::CONTENT_TYPE || *name == header::CONTENT_LENGTH || *name == header::HOST {
                continue;
            }
            let Ok(value) = value.to_str() else { continue };
            let key = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
            environ
                .vars
                .entry(key)
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        environ
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Readable request body.
    pub fn input(&mut self) -> &mut impl Read {
        &mut self.input
    }

    /// Read the whole remaining body.
    pub fn read_body(&mut self) -> std::io::Result<Vec<u8>> {
        let mut body = Vec::new();
        self.input.read_to_end(&mut body)?;
        Ok(body)
    }
}

fn protocol(version: Version) -> &'static str {
    if version == Version::HTTP_09 || version == Version::HTTP_10 {
        "HTTP/1.0"
    } else {
        "HTTP/1.1"
    }
}

fn url_scheme(scheme: &str) -> &'static str {
    match scheme {
        "https" | "wss" => "https",
        _ => "http",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    async fn context(request: Request<Body>) -> RequestContext {
        RequestContext::from_request(request, "http", 1024).await.unwrap()
    }

    #[tokio::test]
    async fn test_variables_from_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/app/run?a=1")
            .version(Version::HTTP_10)
            .header("Host", "example.com:8000")
            .header("Content-Type", "application/json")
            .header("Content-Length", "2")
            .header("X-Trace-Id", "abc")
            .body(Body::from("{}"))
            .unwrap();
        let mut environ = Environ::from_request("/app", "/run", &context(request).await);

        assert_eq!(environ.get(SCRIPT_NAME), Some("/app"));
        assert_eq!(environ.get(PATH_INFO), Some("/run"));
        assert_eq!(environ.get(SERVER_NAME), Some("example.com"));
        assert_eq!(environ.get(SERVER_PORT), Some("8000"));
        assert_eq!(environ.get(HTTP_HOST), Some("example.com:8000"));
        assert_eq!(environ.get(SERVER_PROTOCOL), Some("HTTP/1.0"));
        assert_eq!(environ.get(CONTENT_TYPE), Some("application/json"));
        assert_eq!(environ.get(CONTENT_LENGTH), Some("2"));
        assert_eq!(environ.get(QUERY_STRING), Some("a=1"));
        assert_eq!(environ.get(REQUEST_METHOD), Some("POST"));
        assert_eq!(environ.get(URL_SCHEME), Some("http"));
        assert_eq!(environ.get("HTTP_X_TRACE_ID"), Some("abc"));
        assert_eq!(environ.read_body().unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_ipv6_host() {
        let request = Request::builder()
            .uri("/x")
            .header("Host", "[::1]:8080")
            .body(Body::empty())
            .unwrap();
        let environ = Environ::from_request("", "/x", &context(request).await);
        assert_eq!(environ.get(HTTP_HOST), Some("[::1]:8080"));
        assert_eq!(environ.get(SERVER_NAME), Some("[::1]"));
        assert_eq!(environ.get(SERVER_PORT), Some("8080"));

        let request = Request::builder()
            .uri("/x")
            .header("Host", "[::1]")
            .body(Body::empty())
            .unwrap();
        let environ = Environ::from_request("", "/x", &context(request).await);
        assert_eq!(environ.get(HTTP_HOST), Some("[::1]"));
        assert_eq!(environ.get(SERVER_NAME), Some("[::1]"));
        assert_eq!(environ.get(SERVER_PORT), Some("80"));
    }

    #[tokio::test]
    async fn test_defaults_without_host() {
        let request = Request::builder().uri("/x").body(Body::empty()).unwrap();
        let mut environ = Environ::from_request("", "/x", &context(request).await);

        assert_eq!(environ.get(HTTP_HOST), Some("localhost:80"));
        assert_eq!(environ.get(SERVER_NAME), Some("localhost"));
        assert_eq!(environ.get(SERVER_PORT), Some("80"));
        assert_eq!(environ.get(CONTENT_TYPE), Some("text/plain"));
        assert_eq!(environ.get(CONTENT_LENGTH), None);
        assert_eq!(environ.get(SERVER_PROTOCOL), Some("HTTP/1.1"));
        assert_eq!(environ.get(QUERY_STRING), Some(""));
        assert!(environ.read_body().unwrap().is_empty());
    }
}

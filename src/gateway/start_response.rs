//! Status/header callback and response body accumulation.

use std::fmt;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Response, StatusCode};

use crate::gateway::status::{InvalidStatus, Status};
use crate::http::response::append_headers;

/// Content type of a response that names none.
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// One piece of response body produced by a gateway app.
pub enum Chunk {
    Bytes(Bytes),
    Text(String),
    /// Any other value; rendered with `Display` and encoded as UTF-8.
    Display(Box<dyn fmt::Display + Send>),
}

impl Chunk {
    pub fn display(value: impl fmt::Display + Send + 'static) -> Self {
        Chunk::Display(Box::new(value))
    }

    fn append_to(self, buf: &mut Vec<u8>) {
        match self {
            Chunk::Bytes(bytes) => buf.extend_from_slice(&bytes),
            Chunk::Text(text) => buf.extend_from_slice(text.as_bytes()),
            Chunk::Display(value) => buf.extend_from_slice(value.to_string().as_bytes()),
        }
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chunk::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Chunk::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Chunk::Display(v) => f.debug_tuple("Display").field(&v.to_string()).finish(),
        }
    }
}

impl From<Bytes> for Chunk {
    fn from(bytes: Bytes) -> Self {
        Chunk::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Chunk {
    fn from(bytes: &'static [u8]) -> Self {
        Chunk::Bytes(Bytes::from_static(bytes))
    }
}

impl<const N: usize> From<&'static [u8; N]> for Chunk {
    fn from(bytes: &'static [u8; N]) -> Self {
        Chunk::Bytes(Bytes::from_static(bytes))
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::Text(text.to_string())
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::Text(text)
    }
}

/// Status and headers captured by `StartResponse::start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    /// Headers exactly as the app supplied them.
    pub headers: Vec<(String, String)>,
    /// Explicit content type, or the one derived from `Content-Type`.
    pub content_type: Option<String>,
    explicit_content_type: bool,
}

/// Callback object passed to a gateway app alongside its environment.
#[derive(Debug, Default)]
pub struct StartResponse {
    head: Option<ResponseHead>,
    invalid: Option<InvalidStatus>,
    body: Vec<u8>,
}

impl StartResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin the response. The returned writer appends to the response body.
    pub fn start(
        &mut self,
        status: impl Into<Status>,
        headers: Vec<(String, String)>,
    ) -> Result<BodyWriter<'_>, InvalidStatus> {
        self.begin(status.into(), headers, None)
    }

    /// Begin the response with an explicit content type, overriding any
    /// `Content-Type` header.
    pub fn start_with_content_type(
        &mut self,
        status: impl Into<Status>,
        headers: Vec<(String, String)>,
        content_type: impl Into<String>,
    ) -> Result<BodyWriter<'_>, InvalidStatus> {
        self.begin(status.into(), headers, Some(content_type.into()))
    }

    fn begin(
        &mut self,
        status: Status,
        headers: Vec<(String, String)>,
        content_type: Option<String>,
    ) -> Result<BodyWriter<'_>, InvalidStatus> {
        let status = match status.resolve() {
            Ok(code) => code,
            Err(err) => {
                self.invalid = Some(err.clone());
                return Err(err);
            }
        };
        let explicit_content_type = content_type.is_some();
        let content_type = content_type.or_else(|| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                .and_then(|(_, value)| value.split(';').next())
                .map(|value| value.trim().to_string())
        });
        self.head = Some(ResponseHead {
            status,
            headers,
            content_type,
            explicit_content_type,
        });
        Ok(BodyWriter {
            body: &mut self.body,
        })
    }

    /// Append to the body outside of a `BodyWriter`.
    pub fn write(&mut self, chunk: impl Into<Chunk>) {
        chunk.into().append_to(&mut self.body);
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.head.is_some()
    }

    /// The invalid status the app tried to start with, if any.
    pub fn invalid_status(&self) -> Option<&InvalidStatus> {
        self.invalid.as_ref()
    }

    /// Append the returned chunks and build the response.
    ///
    /// `Ok(None)` means the app never started its response.
    pub fn finish(mut self, chunks: Vec<Chunk>) -> Result<Option<Response<Body>>, InvalidStatus> {
        if let Some(invalid) = self.invalid.take() {
            return Err(invalid);
        }
        let Some(head) = self.head.take() else {
            return Ok(None);
        };
        for chunk in chunks {
            chunk.append_to(&mut self.body);
        }

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = head.status;
        append_headers(
            &mut response,
            head.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())),
        );
        if head.explicit_content_type {
            if let Some(value) = head
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
            {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
        }
        response
            .headers_mut()
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        Ok(Some(response))
    }
}

/// Body-write function returned from `StartResponse::start`.
#[derive(Debug)]
pub struct BodyWriter<'a> {
    body: &'a mut Vec<u8>,
}

impl BodyWriter<'_> {
    pub fn write(&mut self, chunk: impl Into<Chunk>) {
        chunk.into().append_to(self.body);
    }
}

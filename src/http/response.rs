//! Response construction helpers.
//!
//! # Design Decisions
//! - Fixed responses (protocol violations) are plain text with an exact body
//! - Header names/values a gateway app supplies are validated here; invalid
//!   ones are dropped with a warning instead of failing the response

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Response, StatusCode};

/// Body of the response returned when a gateway app never starts its response.
pub const GATEWAY_CALL_ERROR: &str = "WSGI call error.";

/// Plain-text response with a fixed body.
pub fn fixed(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// The fixed `500` answer for a gateway protocol violation.
pub fn gateway_call_error() -> Response<Body> {
    fixed(StatusCode::INTERNAL_SERVER_ERROR, GATEWAY_CALL_ERROR)
}

/// Append `(name, value)` pairs to `response`, skipping invalid ones.
pub fn append_headers<'a, I>(response: &mut Response<Body>, headers: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => {
                tracing::warn!(header = %name, "Dropping invalid response header");
            }
        }
    }
}

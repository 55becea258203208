//! Outcome of handling a request.
//!
//! A reply is delivered either as a complete response or as a stream; an
//! application may also hand back a deferred reply that is resolved before
//! delivery.

use std::fmt;

use axum::body::HttpBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

use crate::error::BoxError;

/// What an application produced for a request.
pub enum Reply {
    /// A response whose body is fully known.
    Full(Response),
    /// A response whose body is produced incrementally.
    Stream(Response),
    /// A reply that is still being computed.
    Deferred(BoxFuture<'static, Result<Reply, BoxError>>),
}

impl Reply {
    /// Classify `response`: bodies of unknown length are streams.
    pub fn from_response(response: Response) -> Self {
        if response.body().size_hint().exact().is_some() {
            Reply::Full(response)
        } else {
            Reply::Stream(response)
        }
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Result<Reply, BoxError>> + Send + 'static,
    {
        Reply::Deferred(Box::pin(future))
    }

    /// Await deferred replies until a concrete one remains.
    pub async fn resolve(self) -> Result<Reply, BoxError> {
        let mut reply = self;
        loop {
            match reply {
                Reply::Deferred(future) => reply = future.await?,
                concrete => return Ok(concrete),
            }
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Reply::Stream(_))
    }

    /// The response, unless the reply is still deferred.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Reply::Full(r) | Reply::Stream(r) => Some(r),
            Reply::Deferred(_) => None,
        }
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        match self {
            Reply::Full(r) | Reply::Stream(r) => Some(r),
            Reply::Deferred(_) => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status())
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::from_response(response)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Full(r) | Reply::Stream(r) => r,
            Reply::Deferred(_) => {
                tracing::error!("Deferred reply reached delivery unresolved");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Full(r) => f.debug_tuple("Full").field(&r.status()).finish(),
            Reply::Stream(r) => f.debug_tuple("Stream").field(&r.status()).finish(),
            Reply::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, Bytes};
    use futures_util::stream;

    #[test]
    fn test_classification() {
        let full = Reply::from_response("done".into_response());
        assert!(!full.is_stream());

        let chunks = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from("a"))]);
        let streamed = Response::new(Body::from_stream(chunks));
        assert!(Reply::from_response(streamed).is_stream());
    }

    #[tokio::test]
    async fn test_nested_deferred_resolves() {
        let reply = Reply::deferred(async {
            Ok(Reply::deferred(async {
                Ok(Reply::from_response((StatusCode::CREATED, "late").into_response()))
            }))
        });
        let resolved = reply.resolve().await.unwrap();
        assert_eq!(resolved.status(), Some(StatusCode::CREATED));
    }
}

//! Tracing layer for dispatches.
//!
//! Records method, path, duration and outcome of each request in a
//! `tracing` span.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::error::DispatchError;

// ---------------------------------------------------------------------------
// TraceLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments dispatches with timing and outcome.
#[derive(Debug, Clone, Copy)]
pub struct TraceLayer;

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService { inner }
    }
}

// ---------------------------------------------------------------------------
// TraceService
// ---------------------------------------------------------------------------

/// Service wrapper that records request duration and outcome in tracing spans.
#[derive(Debug, Clone)]
pub struct TraceService<S> {
    inner: S,
}

impl<S> Service<http::Request<Bytes>> for TraceService<S>
where
    S: Service<http::Request<Bytes>, Response = http::Response<Bytes>, Error = DispatchError>
        + Send,
    S::Future: Send + 'static,
{
    type Response = http::Response<Bytes>;
    type Error = DispatchError;
    type Future =
        Pin<Box<dyn Future<Output = Result<http::Response<Bytes>, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<Bytes>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let span = info_span!(
            "dispatch",
            method = %method,
            path = %path,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;

                let (outcome, status) = match &result {
                    Ok(res) => ("ok", res.status().as_u16()),
                    Err(_) => ("error", 0),
                };

                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                tracing::info!(
                    method = %method,
                    path = %path,
                    status,
                    duration_ms,
                    outcome,
                    "dispatch complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;

    /// Immediately-completing service that echoes the request path.
    struct EchoPath;

    impl Service<http::Request<Bytes>> for EchoPath {
        type Response = http::Response<Bytes>;
        type Error = DispatchError;
        type Future =
            Pin<Box<dyn Future<Output = Result<http::Response<Bytes>, DispatchError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<Bytes>) -> Self::Future {
            let path = Bytes::from(req.uri().path().to_string());
            Box::pin(async move { Ok(http::Response::new(path)) })
        }
    }

    /// Service that always fails.
    struct Failing;

    impl Service<http::Request<Bytes>> for Failing {
        type Response = http::Response<Bytes>;
        type Error = DispatchError;
        type Future =
            Pin<Box<dyn Future<Output = Result<http::Response<Bytes>, DispatchError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: http::Request<Bytes>) -> Self::Future {
            Box::pin(async { Err(DispatchError::RouteNotFound) })
        }
    }

    fn make_req(uri: &str) -> http::Request<Bytes> {
        http::Request::builder()
            .uri(uri)
            .body(Bytes::new())
            .expect("valid request")
    }

    #[tokio::test]
    async fn trace_layer_passes_through_response() {
        let svc = TraceLayer.layer(EchoPath);
        let resp = svc.oneshot(make_req("/users/7")).await.unwrap();
        assert_eq!(resp.body().as_ref(), b"/users/7");
    }

    #[tokio::test]
    async fn trace_layer_passes_through_error() {
        let svc = TraceLayer.layer(Failing);
        let err = svc.oneshot(make_req("/")).await.unwrap_err();
        assert!(err.is_route_not_found());
    }
}

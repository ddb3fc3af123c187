//! Timeout layer for dispatches.
//!
//! The core has no cancellation primitive, so the deadline wraps the whole
//! dispatch from outside. A timed-out dispatch keeps running on the blocking
//! pool until its handler returns; only its result is discarded.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tower::{Layer, Service};

use crate::service::error::DispatchError;

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that fails a dispatch with [`DispatchError::Timeout`] once
/// `timeout` has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    timeout: Duration,
}

impl TimeoutLayer {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            timeout: self.timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces the dispatch deadline.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
    timeout: Duration,
}

impl<S> Service<http::Request<Bytes>> for TimeoutService<S>
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
        let timeout = self.timeout;
        let fut = self.inner.call(req);
        Box::pin(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let timeout_ms = timeout.as_millis() as u64;
                    tracing::warn!(timeout_ms, "dispatch timed out");
                    Err(DispatchError::Timeout { timeout_ms })
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;

    /// Responds with `done` after `delay_ms`.
    struct DelayedResponder {
        delay_ms: u64,
    }

    impl Service<http::Request<Bytes>> for DelayedResponder {
        type Response = http::Response<Bytes>;
        type Error = DispatchError;
        type Future =
            Pin<Box<dyn Future<Output = Result<http::Response<Bytes>, DispatchError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: http::Request<Bytes>) -> Self::Future {
            let delay = Duration::from_millis(self.delay_ms);
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(http::Response::new(Bytes::from_static(b"done")))
            })
        }
    }

    fn make_req() -> http::Request<Bytes> {
        http::Request::new(Bytes::new())
    }

    #[tokio::test]
    async fn fast_dispatch_passes_through() {
        let layer = TimeoutLayer::new(Duration::from_millis(1000));
        let svc = layer.layer(DelayedResponder { delay_ms: 10 });
        let resp = svc.oneshot(make_req()).await.unwrap();
        assert_eq!(resp.body().as_ref(), b"done");
    }

    #[tokio::test]
    async fn slow_dispatch_maps_to_timeout_error() {
        let layer = TimeoutLayer::new(Duration::from_millis(50));
        let svc = layer.layer(DelayedResponder { delay_ms: 200 });
        let err = svc.oneshot(make_req()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { timeout_ms: 50 }));
    }
}

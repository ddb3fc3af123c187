//! Tower adapter: feeds transport requests into an [`App`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use switchyard_core::Version;
use tower::Service;

use super::app::App;
use super::config::ServiceConfig;
use super::error::DispatchError;
use super::request::{Request, Response};

type DispatchFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<Bytes>, DispatchError>> + Send>>;

// ---------------------------------------------------------------------------
// AppService
// ---------------------------------------------------------------------------

/// `tower::Service` running one [`App::dispatch`] per call.
///
/// Each call builds a fresh [`Request`]/[`Response`] pair, reads the API
/// version from the configured header, and attaches the app context.
/// Dispatch runs on the blocking pool since handler bodies are synchronous.
#[derive(Debug, Clone)]
pub struct AppService {
    app: App,
    version_header: Arc<str>,
}

impl AppService {
    #[must_use]
    pub fn new(app: App, config: &ServiceConfig) -> Self {
        Self {
            app,
            version_header: Arc::from(config.version_header.to_ascii_lowercase()),
        }
    }

    fn prepare(&self, req: http::Request<Bytes>) -> Request {
        let version = req
            .headers()
            .get(&*self.version_header)
            .and_then(|v| v.to_str().ok())
            .map(Version::parse)
            .unwrap_or_default();

        let mut request = Request::new(req).with_version(version);
        if let Some(ctx) = self.app.context() {
            request = request.with_context(Arc::clone(ctx));
        }
        request
    }
}

impl Service<http::Request<Bytes>> for AppService {
    type Response = http::Response<Bytes>;
    type Error = DispatchError;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Bytes>) -> Self::Future {
        let mut request = self.prepare(req);
        let app = self.app.clone();

        Box::pin(async move {
            let joined = tokio::task::spawn_blocking(move || {
                let mut response = Response::new();
                app.dispatch(&mut request, &mut response)
                    .map(|()| response.into_http())
            })
            .await;

            match joined {
                Ok(result) => result,
                // A panicking error handler is not part of the error channel.
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => Err(DispatchError::Handler(anyhow::Error::new(err))),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

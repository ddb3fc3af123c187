//! Pipeline composition: wraps the app adapter in the tower layers.

use std::time::Duration;

use bytes::Bytes;
use tower::ServiceBuilder;

use super::timeout::TimeoutLayer;
use super::trace::TraceLayer;
use crate::service::adapter::AppService;
use crate::service::app::App;
use crate::service::config::ServiceConfig;
use crate::service::error::DispatchError;

/// Build the dispatch pipeline around `app`.
///
/// Layer order (outermost to innermost):
/// 1. `TimeoutLayer` -- enforce the per-request deadline
/// 2. `TraceLayer` -- record timing and outcome (closest to the dispatch)
///
/// The returned service implements `tower::Service<http::Request<Bytes>>`.
#[must_use]
pub fn build_dispatch_pipeline(
    app: App,
    config: &ServiceConfig,
) -> impl tower::Service<
    http::Request<Bytes>,
    Response = http::Response<Bytes>,
    Error = DispatchError,
> + Clone {
    ServiceBuilder::new()
        .layer(TimeoutLayer::new(Duration::from_millis(
            config.request_timeout_ms,
        )))
        .layer(TraceLayer)
        .service(AppService::new(app, config))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::StatusCode;
    use switchyard_core::Version;
    use tower::ServiceExt;

    use super::*;
    use crate::service::app::{ErrorHandler, Middleware};
    use crate::service::router::{RouteHandler, Router};

    fn make_app() -> App {
        let mut router = Router::new();
        router
            .get(
                "/users/:id{[0-9]+}",
                Version::new(1, 0, 0),
                RouteHandler::new(|_, _, res, params| {
                    res.write(format!("user {}", params["id"]).as_bytes());
                    Ok(())
                }),
            )
            .unwrap();
        router
            .get(
                "/slow",
                Version::new(1, 0, 0),
                RouteHandler::new(|_, _, _, _| {
                    std::thread::sleep(Duration::from_millis(200));
                    Ok(())
                }),
            )
            .unwrap();
        let router = Arc::new(router);

        let mut builder = App::builder().name("pipeline-test");
        builder.add_middleware(Middleware::new(|_, _, res| {
            res.headers_mut()
                .insert("x-served-by", http::HeaderValue::from_static("switchyard"));
            Ok(())
        }));
        builder.add_middleware(router.as_middleware());
        builder.add_error_handler(ErrorHandler::new(|_, _, res, err| {
            if err.is_route_not_found() {
                res.set_status(StatusCode::NOT_FOUND);
            } else {
                res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }));
        builder.build()
    }

    fn request(uri: &str, version: &'static str) -> http::Request<Bytes> {
        http::Request::builder()
            .method("GET")
            .uri(uri)
            .header("accept-version", version)
            .body(Bytes::new())
            .expect("valid request")
    }

    #[tokio::test]
    async fn routes_request_through_pipeline() {
        let svc = build_dispatch_pipeline(make_app(), &ServiceConfig::default());
        let res = svc.oneshot(request("/users/42", "v1")).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"user 42");
        assert_eq!(res.headers()["x-served-by"], "switchyard");
    }

    #[tokio::test]
    async fn unknown_version_is_not_found() {
        let svc = build_dispatch_pipeline(make_app(), &ServiceConfig::default());
        let res = svc.oneshot(request("/users/42", "v2")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn constraint_mismatch_is_not_found() {
        let svc = build_dispatch_pipeline(make_app(), &ServiceConfig::default());
        let res = svc.oneshot(request("/users/abc", "v1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let config = ServiceConfig {
            request_timeout_ms: 20,
            ..ServiceConfig::default()
        };
        let svc = build_dispatch_pipeline(make_app(), &config);
        let err = svc.oneshot(request("/slow", "v1")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { timeout_ms: 20 }));
    }
}

//! Request dispatch pipeline: ordered middleware with one error channel.
//!
//! A request runs in two phases:
//!
//! 1. **Middleware**: each middleware runs in registration order; the first
//!    error stops the chain. The whole phase sits inside a `catch_unwind`
//!    boundary, so a panicking middleware becomes a [`PanicError`].
//! 2. **Error**: if the first phase failed, every error handler runs in
//!    registration order with the same error. With no error handlers the
//!    error is returned from [`App::dispatch`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use switchyard_core::{Context, Version};
use tracing::{debug, error, warn};

use super::error::{DispatchError, PanicError};
use super::request::{Request, Response};

// ---------------------------------------------------------------------------
// Middleware and ErrorHandler
// ---------------------------------------------------------------------------

type MiddlewareFn =
    dyn Fn(&App, &mut Request, &mut Response) -> Result<(), DispatchError> + Send + Sync;

type ErrorHandlerFn = dyn Fn(&App, &Request, &mut Response, &DispatchError) + Send + Sync;

/// One stage of the middleware chain.
#[derive(Clone)]
pub struct Middleware(Arc<MiddlewareFn>);

impl Middleware {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&App, &mut Request, &mut Response) -> Result<(), DispatchError>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Run the middleware.
    ///
    /// # Errors
    ///
    /// Returns whatever error the middleware returns.
    pub fn call(
        &self,
        app: &App,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<(), DispatchError> {
        (self.0)(app, req, res)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// Receives every error produced by the middleware phase.
///
/// Error handlers cannot fail. A panic raised inside one is not caught and
/// unwinds out of [`App::dispatch`].
#[derive(Clone)]
pub struct ErrorHandler(Arc<ErrorHandlerFn>);

impl ErrorHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&App, &Request, &mut Response, &DispatchError) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, app: &App, req: &Request, res: &mut Response, err: &DispatchError) {
        (self.0)(app, req, res, err);
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler")
    }
}

// ---------------------------------------------------------------------------
// AppBuilder
// ---------------------------------------------------------------------------

/// Collects the app's chains during setup. [`AppBuilder::build`] freezes them.
#[derive(Default)]
pub struct AppBuilder {
    name: String,
    version: Version,
    context: Option<Arc<dyn Context>>,
    middleware: Vec<Middleware>,
    error_handlers: Vec<ErrorHandler>,
}

impl AppBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Sets the app-wide context shared by all requests.
    #[must_use]
    pub fn context(mut self, context: Arc<dyn Context>) -> Self {
        self.context = Some(context);
        self
    }

    /// Append a middleware. `None` is ignored.
    pub fn add_middleware(&mut self, middleware: impl Into<Option<Middleware>>) -> &mut Self {
        if let Some(m) = middleware.into() {
            self.middleware.push(m);
        }
        self
    }

    /// Append an error handler. `None` is ignored.
    pub fn add_error_handler(&mut self, handler: impl Into<Option<ErrorHandler>>) -> &mut Self {
        if let Some(h) = handler.into() {
            self.error_handlers.push(h);
        }
        self
    }

    /// Freeze both chains. The resulting app is immutable and cheap to clone.
    #[must_use]
    pub fn build(self) -> App {
        debug!(
            name = %self.name,
            version = %self.version,
            middleware = self.middleware.len(),
            error_handlers = self.error_handlers.len(),
            "app built"
        );
        App {
            name: Arc::from(self.name),
            version: self.version,
            context: self.context,
            middleware: Arc::from(self.middleware),
            error_handlers: Arc::from(self.error_handlers),
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// A frozen dispatch pipeline, safe to share across concurrent requests.
#[derive(Clone)]
pub struct App {
    name: Arc<str>,
    version: Version,
    context: Option<Arc<dyn Context>>,
    middleware: Arc<[Middleware]>,
    error_handlers: Arc<[ErrorHandler]>,
}

impl App {
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    #[must_use]
    pub fn context(&self) -> Option<&Arc<dyn Context>> {
        self.context.as_ref()
    }

    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    #[must_use]
    pub fn error_handler_count(&self) -> usize {
        self.error_handlers.len()
    }

    /// Drive one request through the pipeline.
    ///
    /// Returns `Ok(())` when every middleware succeeded, or when a failure
    /// was delivered to at least one error handler.
    ///
    /// # Errors
    ///
    /// Returns the middleware error (or the [`PanicError`] wrapping a
    /// recovered panic) when no error handler is registered.
    pub fn dispatch(&self, req: &mut Request, res: &mut Response) -> Result<(), DispatchError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_middleware(req, res)));

        let err = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => {
                debug!(error = %err, "middleware chain stopped");
                err
            }
            Err(payload) => {
                let panic_err = PanicError::new(payload);
                warn!(panic_message = panic_err.message(), "recovered panic in middleware");
                DispatchError::Panic(panic_err)
            }
        };

        self.handle_error(req, res, err)
    }

    fn run_middleware(&self, req: &mut Request, res: &mut Response) -> Result<(), DispatchError> {
        for middleware in self.middleware.iter() {
            middleware.call(self, req, res)?;
        }
        Ok(())
    }

    fn handle_error(
        &self,
        req: &Request,
        res: &mut Response,
        err: DispatchError,
    ) -> Result<(), DispatchError> {
        if self.error_handlers.is_empty() {
            error!(error = %err, "unhandled dispatch error: no error handlers registered");
            return Err(err);
        }

        for handler in self.error_handlers.iter() {
            handler.call(self, req, res, &err);
        }
        Ok(())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("has_context", &self.context.is_some())
            .field("middleware", &self.middleware.len())
            .field("error_handlers", &self.error_handlers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;
    use crate::service::error::UNKNOWN_PANIC_MESSAGE;

    fn make_request() -> Request {
        let inner = http::Request::builder()
            .uri("/")
            .body(Bytes::new())
            .expect("valid request");
        Request::new(inner)
    }

    fn dispatch(app: &App) -> Result<(), DispatchError> {
        app.dispatch(&mut make_request(), &mut Response::new())
    }

    /// Error handler that records each error message it sees into `log`.
    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> ErrorHandler {
        let log = Arc::clone(log);
        ErrorHandler::new(move |_app, _req, _res, err| {
            log.lock().push(format!("{tag}:{err}"));
        })
    }

    #[test]
    fn none_registrations_are_ignored() {
        let mut builder = App::builder();
        builder
            .add_middleware(None::<Middleware>)
            .add_error_handler(None::<ErrorHandler>);
        let app = builder.build();
        assert_eq!(app.middleware_count(), 0);
        assert_eq!(app.error_handler_count(), 0);
    }

    #[test]
    fn builder_sets_metadata() {
        let app = App::builder()
            .name("accounts")
            .version(Version::new(1, 2, 0))
            .build();
        assert_eq!(app.name(), "accounts");
        assert_eq!(app.version().to_string(), "v1.2");
        assert!(app.context().is_none());
    }

    #[test]
    fn middleware_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut builder = App::builder();
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            builder.add_middleware(Middleware::new(move |_, _, _| {
                order.lock().push(tag);
                Ok(())
            }));
        }

        dispatch(&builder.build()).unwrap();
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn middleware_can_write_response() {
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, req, res| {
            req.api_version = Version::new(2, 0, 0);
            res.write(b"hello");
            Ok(())
        }));
        builder.add_middleware(Middleware::new(|_, req, res| {
            res.write(req.api_version.to_string().as_bytes());
            Ok(())
        }));
        let app = builder.build();

        let mut res = Response::new();
        app.dispatch(&mut make_request(), &mut res).unwrap();
        assert_eq!(res.body(), b"hellov2");
    }

    #[test]
    fn first_error_stops_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ran_after = Arc::new(Mutex::new(false));

        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| {
            Err(anyhow::anyhow!("error").into())
        }));
        let flag = Arc::clone(&ran_after);
        builder.add_middleware(Middleware::new(move |_, _, _| {
            *flag.lock() = true;
            Ok(())
        }));
        builder.add_error_handler(recorder(&log, "a"));

        dispatch(&builder.build()).unwrap();
        assert!(!*ran_after.lock());
        assert_eq!(*log.lock(), vec!["a:error"]);
    }

    #[test]
    fn all_error_handlers_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| Err(DispatchError::RouteNotFound)));
        builder.add_error_handler(recorder(&log, "a"));
        builder.add_error_handler(recorder(&log, "b"));

        dispatch(&builder.build()).unwrap();
        assert_eq!(*log.lock(), vec!["a:route not found", "b:route not found"]);
    }

    #[test]
    fn error_handlers_can_respond() {
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| Err(DispatchError::RouteNotFound)));
        builder.add_error_handler(ErrorHandler::new(|_, _, res, err| {
            if err.is_route_not_found() {
                res.set_status(http::StatusCode::NOT_FOUND);
            }
        }));

        let mut res = Response::new();
        builder
            .build()
            .dispatch(&mut make_request(), &mut res)
            .unwrap();
        assert_eq!(res.status(), http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn panic_with_string_becomes_panic_error() {
        let seen = Arc::new(Mutex::new(None));
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| panic!("error")));
        let s = Arc::clone(&seen);
        builder.add_error_handler(ErrorHandler::new(move |_, _, _, err| {
            *s.lock() = err.as_panic().map(|p| p.message().to_string());
        }));

        dispatch(&builder.build()).unwrap();
        assert_eq!(seen.lock().as_deref(), Some("error"));
    }

    #[test]
    fn panic_with_error_keeps_its_message() {
        let seen = Arc::new(Mutex::new(None));
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| {
            panic::panic_any(anyhow::anyhow!("error"))
        }));
        let s = Arc::clone(&seen);
        builder.add_error_handler(ErrorHandler::new(move |_, _, _, err| {
            *s.lock() = err.as_panic().map(|p| p.message().to_string());
        }));

        dispatch(&builder.build()).unwrap();
        assert_eq!(seen.lock().as_deref(), Some("error"));
    }

    #[test]
    fn panic_with_number_uses_fallback_message() {
        let seen = Arc::new(Mutex::new(None));
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| panic::panic_any(300_i32)));
        let s = Arc::clone(&seen);
        builder.add_error_handler(ErrorHandler::new(move |_, _, _, err| {
            *s.lock() = err.as_panic().map(|p| p.message().to_string());
        }));

        dispatch(&builder.build()).unwrap();
        assert_eq!(seen.lock().as_deref(), Some(UNKNOWN_PANIC_MESSAGE));
    }

    #[test]
    fn panic_stops_the_chain_and_reaches_all_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| panic!("boom")));
        builder.add_middleware(Middleware::new(|_, _, _| {
            unreachable!("chain must stop at the panic")
        }));
        builder.add_error_handler(recorder(&log, "a"));
        builder.add_error_handler(recorder(&log, "b"));

        dispatch(&builder.build()).unwrap();
        assert_eq!(*log.lock(), vec!["a:boom", "b:boom"]);
    }

    #[test]
    fn unhandled_error_is_returned() {
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| {
            Err(anyhow::anyhow!("error").into())
        }));
        let err = dispatch(&builder.build()).unwrap_err();
        assert_eq!(err.to_string(), "error");
    }

    #[test]
    fn unhandled_panic_is_returned_as_panic_error() {
        let mut builder = App::builder();
        builder.add_middleware(Middleware::new(|_, _, _| panic!("error")));
        let err = dispatch(&builder.build()).unwrap_err();
        let panic_err = err.as_panic().expect("panic error");
        assert_eq!(panic_err.message(), "error");
        let payload = panic_err.take_payload().expect("payload kept");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"error"));
    }

    #[test]
    fn empty_app_succeeds() {
        dispatch(&App::builder().build()).unwrap();
    }

    #[test]
    fn middleware_sees_the_app() {
        let mut builder = App::builder().name("svc");
        builder.add_middleware(Middleware::new(|app, _, res| {
            res.write(app.name().as_bytes());
            Ok(())
        }));
        let mut res = Response::new();
        builder
            .build()
            .dispatch(&mut make_request(), &mut res)
            .unwrap();
        assert_eq!(res.body(), b"svc");
    }
}

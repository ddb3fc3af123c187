//! Versioned request routing: one segment trie per API version, exposed to
//! the app as a single middleware.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use switchyard_core::Version;
use tracing::debug;

use super::app::{App, Middleware};
use super::config::RouterConfig;
use super::error::{DispatchError, RouteError};
use super::request::{Request, Response};
use super::trie::{decode_path, Node, Params};

// ---------------------------------------------------------------------------
// RouteHandler
// ---------------------------------------------------------------------------

type RouteFn =
    dyn Fn(&App, &mut Request, &mut Response, &Params) -> Result<(), DispatchError> + Send + Sync;

/// Handler invoked for a resolved route with the extracted path parameters.
#[derive(Clone)]
pub struct RouteHandler(Arc<RouteFn>);

impl RouteHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&App, &mut Request, &mut Response, &Params) -> Result<(), DispatchError>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Run the handler.
    ///
    /// # Errors
    ///
    /// Returns whatever error the handler returns.
    pub fn call(
        &self,
        app: &App,
        req: &mut Request,
        res: &mut Response,
        params: &Params,
    ) -> Result<(), DispatchError> {
        (self.0)(app, req, res, params)
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RouteHandler")
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// A registered route, reconstructed from the trie for documentation and
/// debugging. Never used for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub version: Version,
    pub method: String,
    pub path: String,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = format!(
            "{} {} {}",
            self.version,
            self.method.to_uppercase(),
            self.path
        );
        f.write_str(line.trim_matches(' '))
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Routes of one API version, keyed in [`Router`] by the version's
/// canonical string.
#[derive(Debug)]
struct VersionTree {
    version: Version,
    root: Node<RouteHandler>,
}

/// Registry of route handlers, one trie per API version.
///
/// Built during setup, then frozen behind an `Arc` and handed to the app via
/// [`Router::as_middleware`]. Lookups take `&self` only.
#[derive(Debug, Default)]
pub struct Router {
    config: RouterConfig,
    trees: BTreeMap<String, VersionTree>,
}

impl Router {
    /// Create a new empty router with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            trees: BTreeMap::new(),
        }
    }

    /// Register `handler` for `method` and `path` under `version`.
    ///
    /// The method is case-insensitive; the path gets a leading `/` if missing
    /// and loses any trailing `/`. A `None` handler is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] for malformed parameters, invalid patterns,
    /// duplicate parameter names, conflicting parameter shapes, or an
    /// already-registered route. The router is unchanged on error.
    pub fn add_route(
        &mut self,
        method: &str,
        path: &str,
        version: Version,
        handler: impl Into<Option<RouteHandler>>,
    ) -> Result<(), RouteError> {
        let Some(handler) = handler.into() else {
            debug!(method, path, %version, "ignoring route without handler");
            return Ok(());
        };

        let mode = self.config.param_match;
        let key = version.to_string();
        if let Some(tree) = self.trees.get_mut(&key) {
            tree.root.insert(method, path, handler, mode)?;
        } else {
            let mut root = Node::default();
            root.insert(method, path, handler, mode)?;
            self.trees.insert(key, VersionTree { version, root });
        }

        debug!(method, path, %version, "route registered");
        Ok(())
    }

    /// Shorthand for [`Router::add_route`] with `GET`.
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn get(
        &mut self,
        path: &str,
        version: Version,
        handler: impl Into<Option<RouteHandler>>,
    ) -> Result<(), RouteError> {
        self.add_route("GET", path, version, handler)
    }

    /// Shorthand for [`Router::add_route`] with `POST`.
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn post(
        &mut self,
        path: &str,
        version: Version,
        handler: impl Into<Option<RouteHandler>>,
    ) -> Result<(), RouteError> {
        self.add_route("POST", path, version, handler)
    }

    /// Shorthand for [`Router::add_route`] with `PUT`.
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn put(
        &mut self,
        path: &str,
        version: Version,
        handler: impl Into<Option<RouteHandler>>,
    ) -> Result<(), RouteError> {
        self.add_route("PUT", path, version, handler)
    }

    /// Shorthand for [`Router::add_route`] with `DELETE`.
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn delete(
        &mut self,
        path: &str,
        version: Version,
        handler: impl Into<Option<RouteHandler>>,
    ) -> Result<(), RouteError> {
        self.add_route("DELETE", path, version, handler)
    }

    /// Shorthand for [`Router::add_route`] with `HEAD`.
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn head(
        &mut self,
        path: &str,
        version: Version,
        handler: impl Into<Option<RouteHandler>>,
    ) -> Result<(), RouteError> {
        self.add_route("HEAD", path, version, handler)
    }

    /// Resolve a request triple to its handler and path parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RouteNotFound`] when no trie exists for the
    /// version, the path does not match, or the matched node has no handler.
    pub fn resolve(
        &self,
        method: &str,
        path: &str,
        version: &Version,
    ) -> Result<(&RouteHandler, Params), DispatchError> {
        self.trees
            .get(&version.to_string())
            .and_then(|tree| tree.root.find(method, path))
            .ok_or(DispatchError::RouteNotFound)
    }

    /// Resolve the request and run the matched handler. The URI path is
    /// percent-decoded before matching, so parameters carry decoded text.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RouteNotFound`] or the handler's error.
    pub fn dispatch(
        &self,
        app: &App,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<(), DispatchError> {
        let method = req.method().as_str().to_ascii_uppercase();
        let path = decode_path(req.path()).into_owned();
        let version = req.api_version;

        match self.resolve(&method, &path, &version) {
            Ok((handler, params)) => handler.call(app, req, res, &params),
            Err(err) => {
                debug!(method = %method, path = %path, %version, "no route matched");
                Err(err)
            }
        }
    }

    /// Wrap the frozen router as the app middleware performing route
    /// resolution and handler invocation.
    #[must_use]
    pub fn as_middleware(self: &Arc<Self>) -> Middleware {
        let router = Arc::clone(self);
        Middleware::new(move |app, req, res| router.dispatch(app, req, res))
    }

    /// List every registered route, ordered by version key, method, then path.
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        self.trees
            .values()
            .flat_map(|tree| {
                tree.root.routes().into_iter().map(|(method, path)| Route {
                    version: tree.version,
                    method,
                    path,
                })
            })
            .collect()
    }
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.routes().iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Error taxonomy for route registration and request dispatch.

use std::any::Any;
use std::fmt;

use parking_lot::Mutex;

/// Message used when a panic payload is neither an error nor a string.
pub const UNKNOWN_PANIC_MESSAGE: &str = "unknown panic error";

// ---------------------------------------------------------------------------
// RouteError
// ---------------------------------------------------------------------------

/// Errors raised while registering a route. Always reported synchronously
/// during setup, never deferred to request time.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("malformed parameter '{fragment}' in route '{route}': expected ':name' or ':name{{pattern}}'")]
    MalformedParameter { fragment: String, route: String },
    #[error("invalid pattern '{pattern}' in route '{route}': {source}")]
    InvalidPattern {
        pattern: String,
        route: String,
        #[source]
        source: regex::Error,
    },
    #[error("duplicate parameter '{name}' in route '{route}'")]
    DuplicateParameter { name: String, route: String },
    #[error("parameter '{found}' conflicts with existing parameter '{existing}' in route '{route}'")]
    ConflictingParameter {
        existing: String,
        found: String,
        route: String,
    },
    #[error("handler already exists for route '{route}'")]
    DuplicateRoute { route: String },
}

// ---------------------------------------------------------------------------
// PanicError
// ---------------------------------------------------------------------------

/// A panic raised inside the middleware phase, converted into an error.
///
/// The message is resolved once at construction: an error payload's message
/// first, then a string payload verbatim, then [`UNKNOWN_PANIC_MESSAGE`].
/// The original payload stays available through [`PanicError::take_payload`].
pub struct PanicError {
    message: String,
    payload: Mutex<Option<Box<dyn Any + Send>>>,
}

impl PanicError {
    /// Wraps a payload caught by `std::panic::catch_unwind`.
    #[must_use]
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = resolve_panic_message(payload.as_ref());
        Self {
            message,
            payload: Mutex::new(Some(payload)),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Takes the original panic payload, leaving `None` behind.
    ///
    /// Useful to re-raise the panic with `std::panic::resume_unwind`.
    pub fn take_payload(&self) -> Option<Box<dyn Any + Send>> {
        self.payload.lock().take()
    }
}

fn resolve_panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(err) = payload.downcast_ref::<anyhow::Error>() {
        err.to_string()
    } else if let Some(err) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        err.to_string()
    } else if let Some(err) = payload.downcast_ref::<DispatchError>() {
        err.to_string()
    } else if let Some(err) = payload.downcast_ref::<std::io::Error>() {
        err.to_string()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        UNKNOWN_PANIC_MESSAGE.to_string()
    }
}

impl fmt::Debug for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicError")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PanicError {}

// ---------------------------------------------------------------------------
// DispatchError
// ---------------------------------------------------------------------------

/// The single error channel of the dispatch pipeline.
///
/// Returned errors and recovered panics both arrive at error handlers as a
/// `DispatchError`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No trie for the version, no matching path, or no handler at the
    /// reached node.
    #[error("route not found")]
    RouteNotFound,
    #[error(transparent)]
    Panic(#[from] PanicError),
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl DispatchError {
    #[must_use]
    pub fn is_route_not_found(&self) -> bool {
        matches!(self, Self::RouteNotFound)
    }

    /// Returns the wrapped panic, if this error came from a recovered panic.
    #[must_use]
    pub fn as_panic(&self) -> Option<&PanicError> {
        match self {
            Self::Panic(p) => Some(p),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

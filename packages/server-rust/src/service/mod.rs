//! Request dispatch framework.
//!
//! 1. **Router** (`router`, `trie`): versioned segment tries mapping
//!    `(version, method, path)` to a handler plus path parameters
//! 2. **App** (`app`): ordered middleware chain with panic recovery and an
//!    error-handler chain
//! 3. **Adapter** (`adapter`): `tower::Service` feeding transport requests
//!    into an app
//! 4. **Layers** (`layers`): tower layers (timeout, tracing) around the adapter

pub mod adapter;
pub mod app;
pub mod config;
pub mod error;
pub mod layers;
pub mod request;
pub mod router;
pub mod trie;

// Re-export key types for convenient access.
pub use adapter::AppService;
pub use app::{App, AppBuilder, ErrorHandler, Middleware};
pub use config::{ParamMatch, RouterConfig, ServiceConfig};
pub use error::{DispatchError, PanicError, RouteError};
pub use layers::{build_dispatch_pipeline, TimeoutLayer, TraceLayer};
pub use request::{Request, Response};
pub use router::{Route, RouteHandler, Router};
pub use trie::Params;

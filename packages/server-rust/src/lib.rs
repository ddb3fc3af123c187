//! Switchyard server -- versioned request routing, middleware and error
//! handling behind a `tower::Service`.

pub mod context;
pub mod service;
pub mod telemetry;

pub use context::MemoryContext;
pub use service::{
    App, AppBuilder, DispatchError, ErrorHandler, Middleware, Request, Response, RouteHandler,
    Router,
};

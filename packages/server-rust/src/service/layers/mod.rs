//! Tower layers wrapped around [`AppService`](super::AppService).
//!
//! - [`timeout`]: Deadline around one full dispatch
//! - [`trace`]: Per-request span with timing and outcome
//! - [`pipeline`]: Composes the layers and the adapter into one service

pub mod pipeline;
pub mod timeout;
pub mod trace;

pub use pipeline::build_dispatch_pipeline;
pub use timeout::TimeoutLayer;
pub use trace::TraceLayer;

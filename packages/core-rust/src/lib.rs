//! Switchyard Core: API versions, context values and the context capability contract.

pub mod context;
pub mod value;
pub mod version;

pub use context::Context;
pub use value::Value;
pub use version::Version;

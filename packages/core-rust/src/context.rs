//! Context capability contract.
//!
//! The dispatch core never inspects context contents; it only calls through
//! [`Context`]. Backends (in-memory, distributed, request-scoped) are
//! interchangeable behind `Arc<dyn Context>`.

use crate::value::Value;

/// Key-value capability carried by an app or attached to a request.
///
/// All methods take `&self` so one instance can be shared across concurrent
/// requests; implementations use interior mutability. Every method must work
/// on a freshly constructed, empty instance without prior initialization.
pub trait Context: Send + Sync {
    /// Returns the value stored under `key`, or `None` if the key is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: Value) -> anyhow::Result<()>;

    /// Returns true if `key` has been set, including to [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn exists(&self, key: &str) -> anyhow::Result<bool>;
}

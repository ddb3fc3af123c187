use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Runtime value stored in a [`Context`](crate::Context).
///
/// Supports all JSON-compatible types plus binary data, so in-memory,
/// distributed, and request-scoped context backends can all carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Explicit absence of a value. Distinct from an unset key.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Raw bytes, e.g. a cached body.
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    /// Keys stay sorted so serialized output is stable.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the string payload, if this is a `Value::String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

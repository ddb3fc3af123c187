//! In-memory [`Context`] backed by [`DashMap`].
//!
//! Safe to share process-wide: readers never block each other and writers
//! use the map's internal sharding.

use dashmap::DashMap;
use switchyard_core::{Context, Value};

/// Process-local key-value context. Usable immediately after construction.
#[derive(Debug, Default)]
pub struct MemoryContext {
    entries: DashMap<String, Value>,
}

impl MemoryContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Context for MemoryContext {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.entries.contains_key(key))
    }
}

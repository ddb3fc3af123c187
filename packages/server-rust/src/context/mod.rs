//! Context backends implementing [`switchyard_core::Context`].

pub mod memory;

pub use memory::MemoryContext;

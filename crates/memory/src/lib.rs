//! Long-term memory backends for Chimera.

pub mod file_backend;
pub mod in_memory;
mod scoring;

pub use file_backend::FileBackend;
pub use in_memory::InMemoryBackend;

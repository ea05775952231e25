//! Key-value store implementations.
//!
//! - [`InMemoryKeyValueStore`] for tests and ephemeral clients
//! - [`FileKeyValueStore`] persisting to a JSON file, surviving restarts

mod file;
mod in_memory;

pub use file::FileKeyValueStore;
pub use in_memory::InMemoryKeyValueStore;

//! [`FileStore`](kiln_api::FileStore) implementations: the local disk, and an
//! in-memory tree with a logical clock for deterministic timestamps.

pub mod disk;
pub mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

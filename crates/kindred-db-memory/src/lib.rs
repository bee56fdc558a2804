//! In-memory document store for kindred.
//!
//! [`MemoryStore`] implements [`DocumentStore`] on a papaya lock-free map.
//! Reads never block; writes (single operations and batches) are serialized
//! so that every batch applies atomically. The store enforces its batch limit
//! exactly like a hosted store would and keeps statistics about committed
//! batches.
//!
//! ```ignore
//! use kindred_db_memory::MemoryStore;
//! use kindred_storage::DocumentStore;
//!
//! let store = MemoryStore::new();
//! let doc = store.create("interests", None, fields).await?;
//! ```

pub mod stats;
pub mod store;

pub use kindred_storage::{DocumentStore, StorageError};
pub use stats::{BatchStats, BatchStatsSnapshot};
pub use store::{MemoryStore, MemoryStoreOptions};

/// Creates a shareable in-memory store with default options.
pub fn create_store() -> kindred_storage::DynStore {
    std::sync::Arc::new(MemoryStore::new())
}

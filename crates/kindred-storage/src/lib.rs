//! # kindred-storage
//!
//! Document store abstraction for kindred.
//!
//! This crate defines the [`DocumentStore`] trait, the query and write-batch
//! types it speaks, and [`StorageError`]. Backends live in separate crates;
//! [`EventedStore`] wraps any backend and publishes document events.
//!
//! ```ignore
//! use kindred_storage::{DocumentStore, Filter, Query};
//!
//! async fn expired(store: &dyn DocumentStore, cutoff: Timestamp) -> StorageResult<Vec<Document>> {
//!     store
//!         .query(&Query::new("interests").filter(Filter::lt("createdAt", cutoff)))
//!         .await
//! }
//! ```

mod error;
pub mod evented;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use evented::EventedStore;
pub use traits::DocumentStore;
pub use types::{Filter, FilterOp, MAX_BATCH_OPS, Query, WriteBatch, WriteOp};

pub type StorageResult<T> = Result<T, StorageError>;

/// Shareable store handle.
pub type DynStore = std::sync::Arc<dyn DocumentStore>;

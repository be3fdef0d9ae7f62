//! Storage gateways: the tenant-scoped document store and the blob
//! store.
//!
//! The document store is deliberately small: point reads, point
//! writes, merge updates, small collection scans, and a single
//! collection-group scan. No query planner. Per-document writes are
//! linearizable so the outcome subcollection can be scanned after any
//! single write and produce a consistent roll-up.

pub mod blob;
pub mod docstore;
pub mod error;
pub mod paths;
pub mod retry;

pub use blob::{blob_uri, parse_blob_uri, BlobStore, GcsBlobStore, LocalBlobStore, MemoryBlobStore};
pub use docstore::{DocumentStore, MemoryStore};
pub use error::StorageError;
pub use retry::RetryingStore;

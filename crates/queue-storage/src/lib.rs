//! Storage layer for the index queue.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for items and their secondary indexes
//! - A unique (item type, item uid, root) index rejecting duplicate inserts
//! - Per-root indexes of all, pending and failed items for batch selection,
//!   error listing and statistics
//! - Atomic multi-key writes via WriteBatch

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod store;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::{DueKey, ItemKey, RootKey, TripleKey};
pub use store::QueueItemStore;

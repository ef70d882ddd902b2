//! # queue-types
//!
//! Shared domain types for the Index Queue.
//!
//! This crate defines the data structures used throughout the system:
//! - Queue items: one entry per (item type, item uid, root page) triple
//! - Statistics: pending / failed / success partition for a site
//! - Sites: tenant roots and their indexing configurations
//! - Records: the underlying content rows the queue refers to
//! - Settings: layered configuration for binaries
//!
//! ## Usage
//!
//! ```rust
//! use queue_types::{ItemStatus, QueueItem};
//!
//! let item = QueueItem::new(1, "tx_news", 42, 7, "news", 1_700_000_000);
//! assert_eq!(item.status(), ItemStatus::Pending);
//! ```

pub mod config;
pub mod error;
pub mod item;
pub mod record;
pub mod site;
pub mod statistic;

pub use config::Settings;
pub use error::QueueError;
pub use item::{ItemStatus, NewQueueItem, QueueItem, PAGE_ITEM_TYPE};
pub use record::{fields, Record, TableSchema};
pub use site::{
    IndexingConfiguration, Site, SiteConfiguration, DEFAULT_PAGE_INITIALIZER,
    DEFAULT_RECORD_INITIALIZER,
};
pub use statistic::QueueStatistic;

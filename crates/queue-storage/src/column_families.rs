//! Column family definitions for RocksDB.
//!
//! Each column family isolates data with different access patterns:
//! - queue_items: Queue items keyed by id (point reads, full scans)
//! - queue_triples: Unique (type, uid, root) -> id index
//! - queue_roots: (root, id) index for per-site scans
//! - queue_due: (root, changed, id) index of pending items without errors
//! - queue_errors: (root, id) index of failed items

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for queue items
pub const CF_ITEMS: &str = "queue_items";

/// Column family name for the unique triple index
pub const CF_TRIPLES: &str = "queue_triples";

/// Column family name for the per-root index
pub const CF_ROOTS: &str = "queue_roots";

/// Column family name for the pending index, ordered by change time
pub const CF_DUE: &str = "queue_due";

/// Column family name for the failed item index
pub const CF_ERRORS: &str = "queue_errors";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_ITEMS, CF_TRIPLES, CF_ROOTS, CF_DUE, CF_ERRORS];

/// Create column family options for items (compressed JSON values)
fn items_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_ITEMS, items_options()),
        ColumnFamilyDescriptor::new(CF_TRIPLES, Options::default()),
        ColumnFamilyDescriptor::new(CF_ROOTS, Options::default()),
        ColumnFamilyDescriptor::new(CF_DUE, Options::default()),
        ColumnFamilyDescriptor::new(CF_ERRORS, Options::default()),
    ]
}

//! RocksDB wrapper for index queue storage.
//!
//! Provides:
//! - Database open with column family setup
//! - Atomic write batches keeping items and their indexes in step
//! - Serialized read-modify-write for inserts, updates and deletes
//! - Admin operations (stats, compaction)

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info, warn};

use queue_types::{NewQueueItem, QueueItem, QueueStatistic};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_DUE, CF_ERRORS, CF_ITEMS, CF_ROOTS, CF_TRIPLES,
};
use crate::error::StorageError;
use crate::keys::{decode_id, encode_id, validate_item_type, DueKey, ItemKey, RootKey, TripleKey};
use crate::store::QueueItemStore;

/// RocksDB-backed queue item store
pub struct Storage {
    db: DB,
    /// Next item id, ascending in insertion order
    next_id: AtomicU64,
    /// Serializes read-modify-write sequences across threads
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening queue storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;

        let next_id = Self::load_next_id(&db)?;
        debug!(next_id, "Loaded item id counter");

        Ok(Self {
            db,
            next_id: AtomicU64::new(next_id),
            write_lock: Mutex::new(()),
        })
    }

    /// Continue after the highest stored item id; ids start at 1
    fn load_next_id(db: &DB) -> Result<u64, StorageError> {
        let cf = db
            .cf_handle(CF_ITEMS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_ITEMS.to_string()))?;

        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            return Ok(ItemKey::from_bytes(&key)?.id + 1);
        }
        Ok(1)
    }

    fn next_item_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.write_lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn get_item(&self, id: u64) -> Result<Option<QueueItem>, StorageError> {
        match self.db.get_cf(self.cf(CF_ITEMS)?, ItemKey::new(id).to_bytes())? {
            Some(bytes) => Ok(Some(QueueItem::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn find_id(&self, key: &TripleKey) -> Result<Option<u64>, StorageError> {
        self.db
            .get_cf(self.cf(CF_TRIPLES)?, key.to_bytes())?
            .map(|value| decode_id(&value))
            .transpose()
    }

    /// Write a changed item and move its pending/error index entries.
    fn replace_item(&self, previous: &QueueItem, item: &QueueItem) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_ITEMS)?, ItemKey::new(item.id).to_bytes(), item.to_bytes()?);
        self.stage_state_index(&mut batch, Some(previous), Some(item))?;
        self.db.write(batch)?;
        Ok(())
    }

    /// Stage the pending/error index entries of `current` in place of those
    /// of `previous`.
    ///
    /// An item sits in at most one of the two indexes: the error index while
    /// it has errors, otherwise the pending index while `indexed < changed`.
    fn stage_state_index(
        &self,
        batch: &mut WriteBatch,
        previous: Option<&QueueItem>,
        current: Option<&QueueItem>,
    ) -> Result<(), StorageError> {
        let due_cf = self.cf(CF_DUE)?;
        let errors_cf = self.cf(CF_ERRORS)?;
        if let Some(item) = previous {
            batch.delete_cf(due_cf, DueKey::new(item.root, item.changed, item.id).to_bytes());
            batch.delete_cf(errors_cf, RootKey::new(item.root, item.id).to_bytes());
        }
        if let Some(item) = current {
            if item.has_errors() {
                batch.put_cf(errors_cf, RootKey::new(item.root, item.id).to_bytes(), b"");
            } else if item.is_pending() {
                let key = DueKey::new(item.root, item.changed, item.id);
                batch.put_cf(due_cf, key.to_bytes(), b"");
            }
        }
        Ok(())
    }

    /// Read an item, apply `change` and write it back with its indexes.
    /// Returns the updated item, or `None` if the id is unknown.
    fn modify_item(
        &self,
        id: u64,
        change: impl FnOnce(&mut QueueItem),
    ) -> Result<Option<QueueItem>, StorageError> {
        let Some(previous) = self.get_item(id)? else {
            return Ok(None);
        };
        let mut item = previous.clone();
        change(&mut item);
        if item != previous {
            self.replace_item(&previous, &item)?;
        }
        Ok(Some(item))
    }

    /// Iterate over entries with a given prefix in a column family.
    #[allow(clippy::type_complexity)]
    pub fn prefix_iterator(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let cf = self.cf(cf_name)?;

        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }

    fn load_items(&self, ids: Vec<u64>) -> Result<Vec<QueueItem>, StorageError> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_item(id)? {
                Some(item) => items.push(item),
                None => warn!(id, "Index entry points to a missing item"),
            }
        }
        Ok(items)
    }

    fn items_for_root(&self, root: u64) -> Result<Vec<QueueItem>, StorageError> {
        self.items_for_root_index(CF_ROOTS, &RootKey::prefix(root))
    }

    /// Load the items named by `{root}:{id}` keys under `prefix`.
    fn items_for_root_index(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<QueueItem>, StorageError> {
        let ids = self
            .prefix_iterator(cf_name, prefix)?
            .into_iter()
            .map(|(key, _)| RootKey::from_bytes(&key).map(|k| k.id))
            .collect::<Result<Vec<_>, _>>()?;
        self.load_items(ids)
    }

    fn count_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<u64, StorageError> {
        let mut count = 0u64;
        let iter = self
            .db
            .iterator_cf(self.cf(cf_name)?, IteratorMode::From(prefix, Direction::Forward));
        for entry in iter {
            let (key, _) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn items_for_triple_prefix(&self, prefix: &[u8]) -> Result<Vec<QueueItem>, StorageError> {
        let mut ids = self
            .prefix_iterator(CF_TRIPLES, prefix)?
            .into_iter()
            .map(|(_, value)| decode_id(&value))
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort_unstable();
        self.load_items(ids)
    }

    /// Remove items together with their index entries in one batch
    fn delete_batch(&self, items: &[QueueItem]) -> Result<u64, StorageError> {
        if items.is_empty() {
            return Ok(0);
        }
        let items_cf = self.cf(CF_ITEMS)?;
        let triples_cf = self.cf(CF_TRIPLES)?;
        let roots_cf = self.cf(CF_ROOTS)?;

        let mut batch = WriteBatch::default();
        for item in items {
            batch.delete_cf(items_cf, ItemKey::new(item.id).to_bytes());
            batch.delete_cf(
                triples_cf,
                TripleKey::new(item.item_type.as_str(), item.item_uid, item.root).to_bytes(),
            );
            batch.delete_cf(roots_cf, RootKey::new(item.root, item.id).to_bytes());
            self.stage_state_index(&mut batch, Some(item), None)?;
        }
        self.db.write(batch)?;
        debug!(count = items.len(), "Deleted queue items");
        Ok(items.len() as u64)
    }

    fn clear_errors(&self, items: Vec<QueueItem>) -> Result<u64, StorageError> {
        let cf = self.cf(CF_ITEMS)?;
        let mut batch = WriteBatch::default();
        let mut count = 0u64;
        for previous in items.iter().filter(|item| item.has_errors()) {
            let mut item = previous.clone();
            item.errors.clear();
            batch.put_cf(cf, ItemKey::new(item.id).to_bytes(), item.to_bytes()?);
            self.stage_state_index(&mut batch, Some(previous), Some(&item))?;
            count += 1;
        }
        if count > 0 {
            self.db.write(batch)?;
        }
        Ok(count)
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    // ===== Admin Operations =====

    /// Trigger manual compaction on all column families.
    pub fn compact(&self) -> Result<(), StorageError> {
        info!("Starting full compaction...");
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
            }
        }
        info!("Compaction complete");
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            item_count: self.count_cf_entries(self.cf(CF_ITEMS)?)?,
            disk_usage_bytes: self.get_disk_usage(),
        })
    }

    fn count_cf_entries(&self, cf: &ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        let mut total_size = 0u64;
        if let Ok(entries) = std::fs::read_dir(self.db.path()) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }
        total_size
    }
}

impl QueueItemStore for Storage {
    fn add(&self, item: NewQueueItem) -> Result<QueueItem, StorageError> {
        validate_item_type(&item.item_type)?;
        let _guard = self.lock()?;

        let triple = TripleKey::new(item.item_type.as_str(), item.item_uid, item.root);
        if self.find_id(&triple)?.is_some() {
            return Err(StorageError::DuplicateItem {
                item_type: item.item_type,
                item_uid: item.item_uid,
                root: item.root,
            });
        }

        let item = item.into_item(self.next_item_id());

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_ITEMS)?, ItemKey::new(item.id).to_bytes(), item.to_bytes()?);
        batch.put_cf(self.cf(CF_TRIPLES)?, triple.to_bytes(), encode_id(item.id));
        batch.put_cf(self.cf(CF_ROOTS)?, RootKey::new(item.root, item.id).to_bytes(), b"");
        self.stage_state_index(&mut batch, None, Some(&item))?;
        self.db.write(batch)?;

        debug!(
            id = item.id,
            item_type = %item.item_type,
            item_uid = item.item_uid,
            root = item.root,
            "Added queue item"
        );
        Ok(item)
    }

    fn update_existing_item(
        &self,
        item_type: &str,
        item_uid: u64,
        root: u64,
        changed: i64,
        indexing_configuration: &str,
    ) -> Result<Option<QueueItem>, StorageError> {
        let _guard = self.lock()?;

        let Some(id) = self.find_id(&TripleKey::new(item_type, item_uid, root))? else {
            return Ok(None);
        };
        let item = self
            .modify_item(id, |item| {
                item.changed = item.changed.max(changed);
                item.indexing_configuration = indexing_configuration.to_string();
                item.errors.clear();
            })?
            .ok_or_else(|| StorageError::NotFound(format!("item {} of index entry", id)))?;

        debug!(id, item_type, item_uid, root, changed = item.changed, "Updated queue item");
        Ok(Some(item))
    }

    fn find_item_by_id(&self, id: u64) -> Result<Option<QueueItem>, StorageError> {
        self.get_item(id)
    }

    fn find_item(
        &self,
        item_type: &str,
        item_uid: u64,
        root: u64,
    ) -> Result<Option<QueueItem>, StorageError> {
        match self.find_id(&TripleKey::new(item_type, item_uid, root))? {
            Some(id) => self.get_item(id),
            None => Ok(None),
        }
    }

    fn find_items_by_type_and_uid(
        &self,
        item_type: &str,
        item_uid: u64,
    ) -> Result<Vec<QueueItem>, StorageError> {
        self.items_for_triple_prefix(&TripleKey::prefix_for_item(item_type, item_uid))
    }

    fn find_items_by_root(
        &self,
        root: u64,
        indexing_configuration: Option<&str>,
    ) -> Result<Vec<QueueItem>, StorageError> {
        let mut items = self.items_for_root(root)?;
        if let Some(name) = indexing_configuration {
            items.retain(|item| item.indexing_configuration == name);
        }
        Ok(items)
    }

    fn find_all(&self) -> Result<Vec<QueueItem>, StorageError> {
        let mut items = Vec::new();
        for entry in self.db.iterator_cf(self.cf(CF_ITEMS)?, IteratorMode::Start) {
            let (_, value) = entry?;
            items.push(QueueItem::from_bytes(&value)?);
        }
        Ok(items)
    }

    fn count_all(&self) -> Result<u64, StorageError> {
        self.count_cf_entries(self.cf(CF_ITEMS)?)
    }

    fn find_items_to_index(
        &self,
        root: u64,
        now: i64,
        limit: usize,
    ) -> Result<Vec<QueueItem>, StorageError> {
        let prefix = DueKey::prefix(root);
        let iter = self
            .db
            .iterator_cf(self.cf(CF_DUE)?, IteratorMode::From(&prefix, Direction::Forward));

        // keys run in (changed, id) order, so the first future entry ends the batch
        let mut ids = Vec::new();
        for entry in iter {
            if ids.len() >= limit {
                break;
            }
            let (key, _) = entry?;
            if !key.starts_with(&prefix) {
                break;
            }
            let key = DueKey::from_bytes(&key)?;
            if key.changed > now {
                break;
            }
            ids.push(key.id);
        }
        self.load_items(ids)
    }

    fn find_errors_by_root(&self, root: u64) -> Result<Vec<QueueItem>, StorageError> {
        self.items_for_root_index(CF_ERRORS, &RootKey::prefix(root))
    }

    fn find_last_indexed(&self, root: u64) -> Result<Option<QueueItem>, StorageError> {
        Ok(self
            .items_for_root(root)?
            .into_iter()
            .filter(QueueItem::is_indexed)
            .max_by_key(|item| (item.indexed, item.id)))
    }

    fn mark_item_as_failed(&self, id: u64, message: &str) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        let item = self.modify_item(id, |item| item.errors = message.to_string())?;
        Ok(item.is_some())
    }

    fn update_index_time(&self, id: u64, indexed: i64) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        let item = self.modify_item(id, |item| item.indexed = indexed)?;
        Ok(item.is_some())
    }

    fn clear_item_error(&self, id: u64) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        let item = self.modify_item(id, |item| item.errors.clear())?;
        Ok(item.is_some())
    }

    fn flush_all_errors(&self) -> Result<u64, StorageError> {
        let _guard = self.lock()?;
        let count = self.clear_errors(self.items_for_root_index(CF_ERRORS, b"")?)?;
        info!(count, "Cleared errors on all items");
        Ok(count)
    }

    fn flush_errors_by_root(&self, root: u64) -> Result<u64, StorageError> {
        let _guard = self.lock()?;
        let count = self.clear_errors(self.find_errors_by_root(root)?)?;
        info!(count, root, "Cleared errors on root");
        Ok(count)
    }

    fn delete_item(&self, item_type: &str, item_uid: u64) -> Result<u64, StorageError> {
        let _guard = self.lock()?;
        let items = self.items_for_triple_prefix(&TripleKey::prefix_for_item(item_type, item_uid))?;
        self.delete_batch(&items)
    }

    fn delete_items_by_type(&self, item_type: &str) -> Result<u64, StorageError> {
        let _guard = self.lock()?;
        let items = self.items_for_triple_prefix(&TripleKey::prefix_for_type(item_type))?;
        self.delete_batch(&items)
    }

    fn delete_items_by_root(
        &self,
        root: u64,
        indexing_configuration: Option<&str>,
    ) -> Result<u64, StorageError> {
        let _guard = self.lock()?;
        let items = self.find_items_by_root(root, indexing_configuration)?;
        self.delete_batch(&items)
    }

    fn delete_all_items(&self) -> Result<u64, StorageError> {
        let _guard = self.lock()?;
        let items = self.find_all()?;
        self.delete_batch(&items)
    }

    fn statistics(
        &self,
        root: u64,
        indexing_configuration: Option<&str>,
    ) -> Result<QueueStatistic, StorageError> {
        if let Some(name) = indexing_configuration {
            let mut statistic = QueueStatistic::new();
            for item in self.find_items_by_root(root, Some(name))? {
                statistic.record(item.status());
            }
            return Ok(statistic);
        }

        let prefix = RootKey::prefix(root);
        let total = self.count_prefix(CF_ROOTS, &prefix)?;
        let pending_count = self.count_prefix(CF_DUE, &prefix)?;
        let failed_count = self.count_prefix(CF_ERRORS, &prefix)?;
        Ok(QueueStatistic {
            pending_count,
            failed_count,
            success_count: total.saturating_sub(pending_count + failed_count),
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Number of queue items stored
    pub item_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

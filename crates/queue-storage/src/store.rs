//! Persistence interface of the index queue.
//!
//! The engine talks to its store only through [`QueueItemStore`] so that
//! tests and alternative backends can provide their own implementation.

use queue_types::{NewQueueItem, QueueItem, QueueStatistic};

use crate::error::StorageError;

/// Storage operations over queue items.
///
/// Implementations must keep at most one item per (type, uid, root) triple
/// and must make each method atomic with respect to concurrent writers.
pub trait QueueItemStore: Send + Sync {
    /// Insert a new item and return it with its assigned id.
    ///
    /// Fails with [`StorageError::DuplicateItem`] if the triple is taken.
    fn add(&self, item: NewQueueItem) -> Result<QueueItem, StorageError>;

    /// Update the item of an existing triple.
    ///
    /// The stored change time becomes `max(stored, changed)`, the indexing
    /// configuration is replaced and any recorded error is cleared. Returns
    /// the updated item, or `None` if the triple is unknown.
    fn update_existing_item(
        &self,
        item_type: &str,
        item_uid: u64,
        root: u64,
        changed: i64,
        indexing_configuration: &str,
    ) -> Result<Option<QueueItem>, StorageError>;

    /// Item with the given store id.
    fn find_item_by_id(&self, id: u64) -> Result<Option<QueueItem>, StorageError>;

    /// Item of the given triple.
    fn find_item(
        &self,
        item_type: &str,
        item_uid: u64,
        root: u64,
    ) -> Result<Option<QueueItem>, StorageError>;

    /// Items of one content item across all roots, ordered by id.
    fn find_items_by_type_and_uid(
        &self,
        item_type: &str,
        item_uid: u64,
    ) -> Result<Vec<QueueItem>, StorageError>;

    /// Items of one root, optionally limited to one configuration, ordered by id.
    fn find_items_by_root(
        &self,
        root: u64,
        indexing_configuration: Option<&str>,
    ) -> Result<Vec<QueueItem>, StorageError>;

    /// Every item in the store, ordered by id.
    fn find_all(&self) -> Result<Vec<QueueItem>, StorageError>;

    /// Number of items in the store.
    fn count_all(&self) -> Result<u64, StorageError>;

    /// Items of one root due for indexing at `now`, ordered by
    /// (changed, id) and truncated to `limit`.
    fn find_items_to_index(
        &self,
        root: u64,
        now: i64,
        limit: usize,
    ) -> Result<Vec<QueueItem>, StorageError>;

    /// Items of one root carrying an error, ordered by id.
    fn find_errors_by_root(&self, root: u64) -> Result<Vec<QueueItem>, StorageError>;

    /// Most recently indexed item of one root.
    fn find_last_indexed(&self, root: u64) -> Result<Option<QueueItem>, StorageError>;

    /// Record an error on an item. Returns false if the id is unknown.
    fn mark_item_as_failed(&self, id: u64, message: &str) -> Result<bool, StorageError>;

    /// Set the indexed time of an item, leaving its error untouched.
    /// Returns false if the id is unknown.
    fn update_index_time(&self, id: u64, indexed: i64) -> Result<bool, StorageError>;

    /// Clear the error of one item. Returns false if the id is unknown.
    fn clear_item_error(&self, id: u64) -> Result<bool, StorageError>;

    /// Clear errors on every item. Returns the number of items touched.
    fn flush_all_errors(&self) -> Result<u64, StorageError>;

    /// Clear errors on the items of one root.
    fn flush_errors_by_root(&self, root: u64) -> Result<u64, StorageError>;

    /// Delete one content item from every root.
    fn delete_item(&self, item_type: &str, item_uid: u64) -> Result<u64, StorageError>;

    /// Delete every item of one type.
    fn delete_items_by_type(&self, item_type: &str) -> Result<u64, StorageError>;

    /// Delete the items of one root, optionally limited to one configuration.
    fn delete_items_by_root(
        &self,
        root: u64,
        indexing_configuration: Option<&str>,
    ) -> Result<u64, StorageError>;

    /// Delete every item.
    fn delete_all_items(&self) -> Result<u64, StorageError>;

    /// Pending/failed/success counts of one root.
    fn statistics(
        &self,
        root: u64,
        indexing_configuration: Option<&str>,
    ) -> Result<QueueStatistic, StorageError> {
        let mut statistic = QueueStatistic::new();
        for item in self.find_items_by_root(root, indexing_configuration)? {
            statistic.record(item.status());
        }
        Ok(statistic)
    }

    /// Whether the content item is queued for any root.
    fn contains_item(&self, item_type: &str, item_uid: u64) -> Result<bool, StorageError> {
        Ok(!self.find_items_by_type_and_uid(item_type, item_uid)?.is_empty())
    }

    /// Whether the content item is queued for the given root.
    fn contains_item_with_root(
        &self,
        item_type: &str,
        item_uid: u64,
        root: u64,
    ) -> Result<bool, StorageError> {
        Ok(self.find_item(item_type, item_uid, root)?.is_some())
    }

    /// Whether the content item was indexed at least once for any root.
    fn contains_indexed_item(&self, item_type: &str, item_uid: u64) -> Result<bool, StorageError> {
        Ok(self
            .find_items_by_type_and_uid(item_type, item_uid)?
            .iter()
            .any(QueueItem::is_indexed))
    }
}

//! The index queue.
//!
//! [`Queue`] is the single entry point for recording content changes and
//! handing due work to the indexing pipeline:
//! - `update_item` upserts one item for every site that owns it
//! - `initialize` rebuilds a site's queue per indexing configuration
//! - `get_items_to_index` selects a bounded, due-ordered batch
//! - `mark_item_as_failed` / `update_index_time_by_item` record outcomes

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use queue_storage::{QueueItemStore, StorageError};
use queue_types::{NewQueueItem, QueueItem, QueueStatistic, Site, PAGE_ITEM_TYPE};

use crate::change_time::ChangeTimeCalculator;
use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;
use crate::hooks::InitializationObserver;
use crate::initializer::{InitializationContext, Initializer, InitializerRegistry};
use crate::records::{RecordCache, RecordSource};
use crate::resolver::{
    IndexingConfigurationResolver, RootPageResolver, TableConfigurationResolver,
    INVALID_ROOT_PAGE_ID,
};

/// Batch size used when callers have no preference.
pub const DEFAULT_BATCH_LIMIT: usize = 50;

/// Error stored when an item is failed without a message.
const UNKNOWN_ERROR: &str = "unknown error";

/// Reference to a queue item by its store id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemId(pub u64);

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        ItemId(id)
    }
}

impl From<&QueueItem> for ItemId {
    fn from(item: &QueueItem) -> Self {
        ItemId(item.id)
    }
}

/// Fields needed to decide whether a record may be queued.
fn eligibility_fields(item_type: &str) -> Vec<String> {
    let mut fields = vec![queue_types::fields::PID.to_string()];
    if item_type == PAGE_ITEM_TYPE {
        fields.push(queue_types::fields::DOKTYPE.to_string());
        fields.push(queue_types::fields::UID.to_string());
    }
    fields
}

/// Index queue engine.
pub struct Queue {
    store: Arc<dyn QueueItemStore>,
    records: Arc<dyn RecordSource>,
    root_resolver: Arc<dyn RootPageResolver>,
    configuration_resolver: Arc<dyn IndexingConfigurationResolver>,
    change_time: ChangeTimeCalculator,
    initializers: InitializerRegistry,
    observers: Vec<Box<dyn InitializationObserver>>,
    sites: BTreeMap<u64, Site>,
    clock: Arc<dyn Clock>,
}

impl Queue {
    /// Create a queue with the built-in initializers, table based
    /// configuration resolution and the system clock.
    pub fn new(
        store: Arc<dyn QueueItemStore>,
        records: Arc<dyn RecordSource>,
        root_resolver: Arc<dyn RootPageResolver>,
    ) -> Self {
        Self {
            store,
            configuration_resolver: Arc::new(TableConfigurationResolver::new(records.clone())),
            change_time: ChangeTimeCalculator::new(records.clone()),
            records,
            root_resolver,
            initializers: InitializerRegistry::default(),
            observers: Vec::new(),
            sites: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sites the queue serves, keyed by root page id.
    pub fn with_sites(mut self, sites: impl IntoIterator<Item = Site>) -> Self {
        for site in sites {
            self.sites.insert(site.root_page_id, site);
        }
        self
    }

    pub fn with_root_resolver(mut self, resolver: Arc<dyn RootPageResolver>) -> Self {
        self.root_resolver = resolver;
        self
    }

    pub fn with_configuration_resolver(
        mut self,
        resolver: Arc<dyn IndexingConfigurationResolver>,
    ) -> Self {
        self.configuration_resolver = resolver;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_initializer(
        mut self,
        name: impl Into<String>,
        initializer: Box<dyn Initializer>,
    ) -> Self {
        self.register_initializer(name, initializer);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn InitializationObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    /// Register an initializer strategy under a name configurations refer to.
    pub fn register_initializer(
        &mut self,
        name: impl Into<String>,
        initializer: Box<dyn Initializer>,
    ) {
        self.initializers.register(name, initializer);
    }

    /// Add a post-initialization observer; observers run in insertion order.
    pub fn add_observer(&mut self, observer: Box<dyn InitializationObserver>) {
        self.observers.push(observer);
    }

    /// Configured site for a root page id.
    pub fn site(&self, root_page_id: u64) -> Option<&Site> {
        self.sites.get(&root_page_id)
    }

    pub fn store(&self) -> &Arc<dyn QueueItemStore> {
        &self.store
    }

    // ==================== Initialization ====================

    /// Rebuild the queue of a site.
    ///
    /// With `None` (or an empty name) every enabled configuration of the site
    /// is rebuilt, otherwise only the named one. Returns a success flag per
    /// configuration. Observers run after all configurations are done.
    pub fn initialize(
        &self,
        site: &Site,
        configuration_name: Option<&str>,
    ) -> Result<BTreeMap<String, bool>, EngineError> {
        let names = match configuration_name.filter(|name| !name.is_empty()) {
            Some(name) => vec![name.to_string()],
            None => site.configuration.enabled_configuration_names(),
        };

        let mut status = BTreeMap::new();
        for name in &names {
            let succeeded = self.initialize_configuration(site, name)?;
            status.insert(name.clone(), succeeded);
        }

        for observer in &self.observers {
            debug!(
                observer = observer.name(),
                root = site.root_page_id,
                "Running initialization observer"
            );
            observer.post_process_initialization(site, &names, &status)?;
        }

        info!(
            root = site.root_page_id,
            configurations = names.len(),
            failed = status.values().filter(|ok| !**ok).count(),
            "Queue initialized"
        );
        Ok(status)
    }

    fn initialize_configuration(&self, site: &Site, name: &str) -> Result<bool, EngineError> {
        let configuration = site.configuration.configuration(name).ok_or_else(|| {
            EngineError::UnknownConfiguration {
                configuration: name.to_string(),
                root: site.root_page_id,
            }
        })?;
        let initializer_name = site.configuration.initializer_name(name);
        let initializer = self.initializers.get(&initializer_name).ok_or_else(|| {
            EngineError::UnknownInitializer {
                initializer: initializer_name.clone(),
                configuration: name.to_string(),
            }
        })?;

        let removed = self.store.delete_items_by_root(site.root_page_id, Some(name))?;
        let table = site.configuration.table_name_or_fallback(name);
        debug!(
            root = site.root_page_id,
            configuration = name,
            table = %table,
            initializer = %initializer_name,
            removed,
            "Initializing configuration"
        );

        let context = InitializationContext {
            site,
            item_type: &table,
            configuration_name: name,
            configuration,
            store: self.store.as_ref(),
            records: self.records.as_ref(),
            change_time: &self.change_time,
        };
        initializer.initialize(&context)
    }

    // ==================== Change tracking ====================

    /// Record that an item changed.
    ///
    /// The item is queued or refreshed for every site owning it. A positive
    /// `forced_change_time` replaces the computed change time of already
    /// queued items; the stored change time never moves backwards.
    ///
    /// Each call reads records fresh from the source. Use
    /// [`Queue::update_batch`] to share lookups across related calls.
    pub fn update_item(
        &self,
        item_type: &str,
        item_uid: u64,
        forced_change_time: i64,
    ) -> Result<(), EngineError> {
        self.update_batch()
            .update_item(item_type, item_uid, forced_change_time)
    }

    /// Start a batch of updates that share record lookups.
    pub fn update_batch(&self) -> UpdateBatch<'_> {
        UpdateBatch {
            queue: self,
            cache: RecordCache::new(),
        }
    }

    fn update_item_cached(
        &self,
        cache: &RecordCache,
        item_type: &str,
        item_uid: u64,
        forced_change_time: i64,
    ) -> Result<(), EngineError> {
        let roots = self
            .root_resolver
            .responsible_root_page_ids(item_type, item_uid)?;

        for root in roots {
            if root == INVALID_ROOT_PAGE_ID {
                debug!(item_type, item_uid, "Item has no owning site, skipping");
                continue;
            }
            let Some(site) = self.sites.get(&root) else {
                warn!(item_type, item_uid, root, "Root page is not a configured site, skipping");
                continue;
            };
            let Some(configuration) = self.configuration_resolver.indexing_configuration_name(
                item_type,
                item_uid,
                &site.configuration,
            )?
            else {
                debug!(item_type, item_uid, root, "No indexing configuration applies, skipping");
                continue;
            };

            if self.store.contains_item_with_root(item_type, item_uid, root)? {
                self.refresh_item(item_type, item_uid, root, forced_change_time, &configuration)?;
            } else {
                let target = NewItemTarget {
                    site,
                    configuration: &configuration,
                    forced_change_time,
                };
                self.add_new_item(cache, item_type, item_uid, &target)?;
            }
        }
        Ok(())
    }

    fn refresh_item(
        &self,
        item_type: &str,
        item_uid: u64,
        root: u64,
        forced_change_time: i64,
        configuration: &str,
    ) -> Result<(), EngineError> {
        let changed = if forced_change_time > 0 {
            forced_change_time
        } else {
            self.change_time.item_changed_time(item_type, item_uid)?
        };

        match self
            .store
            .update_existing_item(item_type, item_uid, root, changed, configuration)?
        {
            Some(item) => debug!(id = item.id, changed = item.changed, "Refreshed queue item"),
            None => debug!(item_type, item_uid, root, "Item vanished before refresh"),
        }
        Ok(())
    }

    fn add_new_item(
        &self,
        cache: &RecordCache,
        item_type: &str,
        item_uid: u64,
        target: &NewItemTarget<'_>,
    ) -> Result<(), EngineError> {
        let fields = eligibility_fields(item_type);
        let Some(record) = cache.get_or_fetch(self.records.as_ref(), item_type, item_uid, &fields)?
        else {
            debug!(item_type, item_uid, "Record not found, not queueing");
            return Ok(());
        };

        let site = target.site;
        if item_type == PAGE_ITEM_TYPE {
            let allowed = record.doktype().is_some_and(|doktype| {
                site.configuration
                    .is_allowed_page_type(target.configuration, doktype)
            });
            if !allowed {
                debug!(
                    item_uid,
                    doktype = ?record.doktype(),
                    "Page type not allowed, not queueing"
                );
                return Ok(());
            }
        }

        let changed = self.change_time.item_changed_time(item_type, item_uid)?;
        let item = NewQueueItem::new(
            item_type,
            item_uid,
            site.root_page_id,
            target.configuration,
            changed,
        );
        match self.store.add(item) {
            Ok(item) => {
                debug!(
                    id = item.id,
                    item_type,
                    item_uid,
                    root = item.root,
                    changed,
                    "Queued new item"
                );
                Ok(())
            }
            Err(StorageError::DuplicateItem { .. }) => {
                // lost an insert race; the other writer's item is refreshed instead
                self.refresh_item(
                    item_type,
                    item_uid,
                    site.root_page_id,
                    target.forced_change_time,
                    target.configuration,
                )
            }
            Err(e) => Err(e.into()),
        }
    }

    // ==================== Processing ====================

    /// Due items of a site, oldest change first, at most `limit`.
    pub fn get_items_to_index(
        &self,
        site: &Site,
        limit: usize,
    ) -> Result<Vec<QueueItem>, EngineError> {
        Ok(self
            .store
            .find_items_to_index(site.root_page_id, self.clock.now(), limit)?)
    }

    /// Record an indexing failure. An empty message is stored as
    /// "unknown error" so the item still counts as failed.
    pub fn mark_item_as_failed(
        &self,
        item: impl Into<ItemId>,
        error_message: &str,
    ) -> Result<(), EngineError> {
        let ItemId(id) = item.into();
        let message = if error_message.is_empty() {
            UNKNOWN_ERROR
        } else {
            error_message
        };
        if !self.store.mark_item_as_failed(id, message)? {
            warn!(id, "Cannot mark unknown item as failed");
        }
        Ok(())
    }

    /// Record a successful indexing run at the current time.
    ///
    /// A recorded error is kept; see [`Queue::reset_item_error`].
    pub fn update_index_time_by_item(&self, item: &QueueItem) -> Result<(), EngineError> {
        if !self.store.update_index_time(item.id, self.clock.now())? {
            warn!(id = item.id, "Cannot update index time of unknown item");
        }
        Ok(())
    }

    /// Clear the error of one item.
    pub fn reset_item_error(&self, item: impl Into<ItemId>) -> Result<(), EngineError> {
        let ItemId(id) = item.into();
        self.store.clear_item_error(id)?;
        Ok(())
    }

    // ==================== Queries ====================

    /// Pending/failed/success counts of a site, optionally for one
    /// configuration.
    pub fn get_statistics_by_site(
        &self,
        site: &Site,
        configuration_name: Option<&str>,
    ) -> Result<QueueStatistic, EngineError> {
        let configuration = configuration_name.filter(|name| !name.is_empty());
        Ok(self.store.statistics(site.root_page_id, configuration)?)
    }

    pub fn contains_item(&self, item_type: &str, item_uid: u64) -> Result<bool, EngineError> {
        Ok(self.store.contains_item(item_type, item_uid)?)
    }

    pub fn contains_item_with_root_page_id(
        &self,
        item_type: &str,
        item_uid: u64,
        root_page_id: u64,
    ) -> Result<bool, EngineError> {
        Ok(self
            .store
            .contains_item_with_root(item_type, item_uid, root_page_id)?)
    }

    pub fn contains_indexed_item(
        &self,
        item_type: &str,
        item_uid: u64,
    ) -> Result<bool, EngineError> {
        Ok(self.store.contains_indexed_item(item_type, item_uid)?)
    }

    pub fn get_item(&self, id: u64) -> Result<Option<QueueItem>, EngineError> {
        Ok(self.store.find_item_by_id(id)?)
    }

    /// Items of one content item across all sites.
    pub fn get_items(&self, item_type: &str, item_uid: u64) -> Result<Vec<QueueItem>, EngineError> {
        Ok(self.store.find_items_by_type_and_uid(item_type, item_uid)?)
    }

    pub fn get_all_items(&self) -> Result<Vec<QueueItem>, EngineError> {
        Ok(self.store.find_all()?)
    }

    pub fn get_all_items_count(&self) -> Result<u64, EngineError> {
        Ok(self.store.count_all()?)
    }

    pub fn get_errors_by_site(&self, site: &Site) -> Result<Vec<QueueItem>, EngineError> {
        Ok(self.store.find_errors_by_root(site.root_page_id)?)
    }

    /// Clear errors on every item. Returns the number of items cleared.
    pub fn reset_all_errors(&self) -> Result<u64, EngineError> {
        Ok(self.store.flush_all_errors()?)
    }

    pub fn reset_errors_by_site(&self, site: &Site) -> Result<u64, EngineError> {
        Ok(self.store.flush_errors_by_root(site.root_page_id)?)
    }

    /// Time of the latest indexing run of a site, 0 if none.
    pub fn get_last_index_time(&self, root_page_id: u64) -> Result<i64, EngineError> {
        Ok(self
            .store
            .find_last_indexed(root_page_id)?
            .map_or(0, |item| item.indexed))
    }

    /// Id of the most recently indexed item of a site, 0 if none.
    pub fn get_last_indexed_item_id(&self, root_page_id: u64) -> Result<u64, EngineError> {
        Ok(self
            .store
            .find_last_indexed(root_page_id)?
            .map_or(0, |item| item.id))
    }

    // ==================== Deletion ====================

    /// Remove a content item from every site.
    pub fn delete_item(&self, item_type: &str, item_uid: u64) -> Result<u64, EngineError> {
        Ok(self.store.delete_item(item_type, item_uid)?)
    }

    pub fn delete_items_by_type(&self, item_type: &str) -> Result<u64, EngineError> {
        Ok(self.store.delete_items_by_type(item_type)?)
    }

    pub fn delete_items_by_site(
        &self,
        site: &Site,
        configuration_name: Option<&str>,
    ) -> Result<u64, EngineError> {
        let configuration = configuration_name.filter(|name| !name.is_empty());
        Ok(self
            .store
            .delete_items_by_root(site.root_page_id, configuration)?)
    }

    pub fn delete_all_items(&self) -> Result<u64, EngineError> {
        Ok(self.store.delete_all_items()?)
    }
}

/// Site and configuration a new item is queued under.
struct NewItemTarget<'a> {
    site: &'a Site,
    configuration: &'a str,
    forced_change_time: i64,
}

/// A group of related updates sharing record lookups.
///
/// Eligibility reads (page type, existence) are memoized for the lifetime of
/// the batch only. A record edited after a batch started is seen by the next
/// batch, never by the current one.
pub struct UpdateBatch<'a> {
    queue: &'a Queue,
    cache: RecordCache,
}

impl UpdateBatch<'_> {
    /// Same as [`Queue::update_item`], reusing records fetched earlier in
    /// this batch.
    pub fn update_item(
        &self,
        item_type: &str,
        item_uid: u64,
        forced_change_time: i64,
    ) -> Result<(), EngineError> {
        self.queue
            .update_item_cached(&self.cache, item_type, item_uid, forced_change_time)
    }

    /// Number of records memoized so far.
    pub fn cached_records(&self) -> usize {
        self.cache.len()
    }
}

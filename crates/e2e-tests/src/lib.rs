//! End-to-end test infrastructure for the index queue.
//!
//! Provides a shared TestHarness wiring a real RocksDB store, an in-memory
//! content source and a manual clock into a [`Queue`], plus a recording
//! indexer for worker scenarios.

use std::sync::{Arc, Mutex};

use queue_engine::{EngineError, ItemIndexer, ManualClock, MemoryRecordSource, Queue};
use queue_storage::Storage;
use queue_types::{IndexingConfiguration, QueueItem, Record, Site, SiteConfiguration, TableSchema};

/// Wall clock the harness starts at (2023-11-14T22:13:20Z).
pub const NOW: i64 = 1_700_000_000;

/// Root page of the default test site.
pub const SITE_ROOT: u64 = 7;

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub storage: Arc<Storage>,
    pub source: Arc<MemoryRecordSource>,
    pub clock: Arc<ManualClock>,
    pub queue: Arc<Queue>,
    pub site: Site,
    pub sites: Vec<Site>,
}

impl TestHarness {
    /// Harness serving the default site only.
    pub fn new() -> Self {
        Self::with_sites(vec![default_site()])
    }

    /// Harness serving the given sites. The first one becomes `site`.
    pub fn with_sites(sites: Vec<Site>) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));
        let source = Arc::new(MemoryRecordSource::new());
        source.set_schema("article", TableSchema::with_default_starttime());
        let clock = Arc::new(ManualClock::new(NOW));

        let site = sites.first().cloned().expect("At least one site is required");
        let queue = Queue::new(storage.clone(), source.clone(), source.clone())
            .with_sites(sites.clone())
            .with_clock(clock.clone());

        Self {
            _temp_dir: temp_dir,
            storage,
            source,
            clock,
            queue: Arc::new(queue),
            site,
            sites,
        }
    }

    /// Replace the queue with one over the same store, content and clock,
    /// customized by `configure` (observers, initializers, resolvers).
    pub fn rebuild_queue(&mut self, configure: impl FnOnce(Queue) -> Queue) {
        let queue = Queue::new(self.storage.clone(), self.source.clone(), self.source.clone())
            .with_sites(self.sites.clone())
            .with_clock(self.clock.clone());
        self.queue = Arc::new(configure(queue));
    }

    /// Store an article owned by the given sites.
    pub fn add_article(&self, uid: u64, tstamp: i64, roots: &[u64]) {
        self.source.insert_record(
            Record::new("article", uid)
                .with_field("pid", 3)
                .with_field("tstamp", tstamp),
            roots,
        );
    }

    /// Store a page owned by the given sites.
    pub fn add_page(&self, uid: u64, doktype: u32, tstamp: i64, roots: &[u64]) {
        self.source.insert_record(
            Record::new("pages", uid)
                .with_field("pid", SITE_ROOT)
                .with_field("doktype", doktype)
                .with_field("tstamp", tstamp),
            roots,
        );
    }

    /// The only queue item of a content item in the default site.
    pub fn item(&self, item_type: &str, uid: u64) -> QueueItem {
        let mut items: Vec<QueueItem> = self
            .queue
            .get_items(item_type, uid)
            .expect("Failed to read items")
            .into_iter()
            .filter(|item| item.root == self.site.root_page_id)
            .collect();
        assert_eq!(items.len(), 1, "Expected one item for {}:{}", item_type, uid);
        items.remove(0)
    }

    /// Uids of the due batch of the default site, in batch order.
    pub fn due_uids(&self, limit: usize) -> Vec<u64> {
        self.queue
            .get_items_to_index(&self.site, limit)
            .expect("Failed to select due items")
            .iter()
            .map(|item| item.item_uid)
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Site 7 with an article configuration and a page configuration.
pub fn default_site() -> Site {
    Site::new(SITE_ROOT, "Main").with_configuration(
        SiteConfiguration::new()
            .with_configuration("articles", IndexingConfiguration::for_table("article"))
            .with_configuration("pages", IndexingConfiguration::default()),
    )
}

/// Indexer recording every item it sees; fails for selected uids.
#[derive(Clone, Default)]
pub struct RecordingIndexer {
    pub seen: Arc<Mutex<Vec<u64>>>,
    pub failing_uids: Arc<Mutex<Vec<u64>>>,
}

impl RecordingIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, uid: u64) {
        self.failing_uids.lock().expect("lock poisoned").push(uid);
    }

    pub fn recover(&self) {
        self.failing_uids.lock().expect("lock poisoned").clear();
    }

    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().expect("lock poisoned").clone()
    }
}

impl ItemIndexer for RecordingIndexer {
    fn index_item(&self, item: &QueueItem) -> Result<(), EngineError> {
        self.seen.lock().expect("lock poisoned").push(item.item_uid);
        if self
            .failing_uids
            .lock()
            .expect("lock poisoned")
            .contains(&item.item_uid)
        {
            return Err(EngineError::Indexer("connection refused".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

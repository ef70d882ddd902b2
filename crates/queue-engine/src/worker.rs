//! Index worker draining due queue items.
//!
//! The worker pulls a due batch for a site, hands every item to an
//! [`ItemIndexer`] and records the outcome on the queue: a success stamps
//! the index time and clears a previous error, a failure stores the error
//! message so the item leaves the due set until it changes again.

use std::sync::Arc;

use tracing::{debug, info, warn};

use queue_types::{QueueItem, Site};

use crate::error::EngineError;
use crate::queue::{Queue, DEFAULT_BATCH_LIMIT};

/// Submits one queue item to the search engine.
pub trait ItemIndexer: Send + Sync {
    fn index_item(&self, item: &QueueItem) -> Result<(), EngineError>;

    /// Name used in log output.
    fn name(&self) -> &str;
}

/// Outcome of draining one or more batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainResult {
    /// Items handed out by the queue
    pub selected: usize,
    /// Items indexed successfully
    pub indexed: usize,
    /// Items marked as failed
    pub failed: usize,
}

impl DrainResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.indexed += 1;
    }

    pub fn record_error(&mut self) {
        self.failed += 1;
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: &DrainResult) {
        self.selected += other.selected;
        self.indexed += other.indexed;
        self.failed += other.failed;
    }

    /// Items with a recorded outcome.
    pub fn total(&self) -> usize {
        self.indexed + self.failed
    }

    pub fn has_updates(&self) -> bool {
        self.indexed > 0
    }
}

/// Configuration for the index worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum items taken per site and run
    pub batch_size: usize,
    /// Whether to keep going after an item failed
    pub continue_on_error: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_LIMIT,
            continue_on_error: true,
        }
    }
}

impl WorkerConfig {
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Drains due items of sites through an indexer.
pub struct IndexWorker {
    queue: Arc<Queue>,
    indexer: Box<dyn ItemIndexer>,
    config: WorkerConfig,
}

impl IndexWorker {
    pub fn new(queue: Arc<Queue>, indexer: Box<dyn ItemIndexer>) -> Self {
        Self {
            queue,
            indexer,
            config: WorkerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Index one due batch of a site.
    pub fn drain_site(&self, site: &Site) -> Result<DrainResult, EngineError> {
        let items = self
            .queue
            .get_items_to_index(site, self.config.batch_size.max(1))?;

        if items.is_empty() {
            debug!(root = site.root_page_id, "No due items");
            return Ok(DrainResult::new());
        }

        info!(
            root = site.root_page_id,
            count = items.len(),
            indexer = %self.indexer.name(),
            "Indexing due items"
        );

        let mut result = DrainResult {
            selected: items.len(),
            ..DrainResult::default()
        };
        self.process(&items, &mut result)?;

        info!(
            root = site.root_page_id,
            indexed = result.indexed,
            failed = result.failed,
            "Batch finished"
        );
        Ok(result)
    }

    /// Retry the failed items of a site regardless of their change time.
    pub fn retry_failed(&self, site: &Site) -> Result<DrainResult, EngineError> {
        let mut items = self.queue.get_errors_by_site(site)?;
        items.truncate(self.config.batch_size.max(1));

        let mut result = DrainResult {
            selected: items.len(),
            ..DrainResult::default()
        };
        self.process(&items, &mut result)?;

        if result.selected > 0 {
            info!(
                root = site.root_page_id,
                recovered = result.indexed,
                failed = result.failed,
                "Retried failed items"
            );
        }
        Ok(result)
    }

    /// Drain one batch of every given site.
    pub fn drain_all<'a>(
        &self,
        sites: impl IntoIterator<Item = &'a Site>,
    ) -> Result<DrainResult, EngineError> {
        let mut total = DrainResult::new();
        for site in sites {
            let result = self.drain_site(site)?;
            total.merge(&result);
        }
        Ok(total)
    }

    fn process(&self, items: &[QueueItem], result: &mut DrainResult) -> Result<(), EngineError> {
        for item in items {
            match self.indexer.index_item(item) {
                Ok(()) => {
                    self.queue.update_index_time_by_item(item)?;
                    if item.has_errors() {
                        self.queue.reset_item_error(item)?;
                    }
                    result.record_success();
                }
                Err(e) => {
                    warn!(
                        indexer = %self.indexer.name(),
                        id = item.id,
                        item_type = %item.item_type,
                        item_uid = item.item_uid,
                        error = %e,
                        "Failed to index item"
                    );
                    self.queue.mark_item_as_failed(item, &e.to_string())?;
                    result.record_error();

                    if !self.config.continue_on_error {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

//! Initializer strategies.
//!
//! An initializer bulk-populates the queue for one site and indexing
//! configuration. Strategies are looked up by name in an
//! [`InitializerRegistry`]; `record` and `page` are built in and further
//! strategies can be registered for new content types.

mod page;
mod record;

use std::collections::HashMap;

use tracing::debug;

use queue_storage::{QueueItemStore, StorageError};
use queue_types::{
    IndexingConfiguration, NewQueueItem, Site, DEFAULT_PAGE_INITIALIZER, DEFAULT_RECORD_INITIALIZER,
};

use crate::change_time::ChangeTimeCalculator;
use crate::error::EngineError;
use crate::records::RecordSource;

pub use page::{PageInitializer, PageParameters};
pub use record::RecordInitializer;

/// Everything an initializer needs for one (site, configuration) run.
pub struct InitializationContext<'a> {
    pub site: &'a Site,
    /// Content type (table) being initialized
    pub item_type: &'a str,
    pub configuration_name: &'a str,
    pub configuration: &'a IndexingConfiguration,
    pub store: &'a dyn QueueItemStore,
    pub records: &'a dyn RecordSource,
    pub change_time: &'a ChangeTimeCalculator,
}

impl InitializationContext<'_> {
    /// Queue one record of the context's type for the context's site.
    ///
    /// Returns false if the triple was already queued, e.g. by another
    /// configuration of the same site.
    pub fn enqueue(&self, item_uid: u64, parameters: Option<String>) -> Result<bool, EngineError> {
        let changed = self.change_time.item_changed_time(self.item_type, item_uid)?;
        let mut item = NewQueueItem::new(
            self.item_type,
            item_uid,
            self.site.root_page_id,
            self.configuration_name,
            changed,
        );
        item.serialized_parameters = parameters;

        match self.store.add(item) {
            Ok(_) => Ok(true),
            Err(StorageError::DuplicateItem { .. }) => {
                debug!(
                    item_type = self.item_type,
                    item_uid,
                    root = self.site.root_page_id,
                    "Item already queued, skipping"
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Bulk population strategy for one content type.
pub trait Initializer: Send + Sync {
    /// Queue all eligible records. Returns false if the run was incomplete.
    fn initialize(&self, context: &InitializationContext<'_>) -> Result<bool, EngineError>;
}

/// Initializers by name.
pub struct InitializerRegistry {
    initializers: HashMap<String, Box<dyn Initializer>>,
}

impl InitializerRegistry {
    /// Registry without any initializer.
    pub fn empty() -> Self {
        Self {
            initializers: HashMap::new(),
        }
    }

    /// Register an initializer, replacing any previous one of that name.
    pub fn register(&mut self, name: impl Into<String>, initializer: Box<dyn Initializer>) {
        self.initializers.insert(name.into(), initializer);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Initializer> {
        self.initializers.get(name).map(|i| i.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.initializers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for InitializerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_RECORD_INITIALIZER, Box::new(RecordInitializer));
        registry.register(DEFAULT_PAGE_INITIALIZER, Box::new(PageInitializer));
        registry
    }
}

//! Index queue engine.
//!
//! Tracks which content items must be (re-)submitted to the search engine:
//! - [`Queue`] upserts items on change, initializes sites and hands out
//!   due batches
//! - [`ChangeTimeCalculator`] derives the authoritative change time
//! - [`Initializer`] strategies bulk-populate the queue per content type
//! - [`IndexWorker`] drains due items through an [`ItemIndexer`]
//! - [`ReIndexTask`] re-initializes selected configurations of a site

pub mod change_time;
pub mod clock;
pub mod error;
pub mod hooks;
pub mod initializer;
pub mod memory;
pub mod queue;
pub mod records;
pub mod resolver;
pub mod task;
pub mod worker;

pub use change_time::ChangeTimeCalculator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EngineError;
pub use hooks::InitializationObserver;
pub use initializer::{
    InitializationContext, Initializer, InitializerRegistry, PageInitializer, PageParameters,
    RecordInitializer,
};
pub use memory::MemoryRecordSource;
pub use queue::{ItemId, Queue, UpdateBatch, DEFAULT_BATCH_LIMIT};
pub use records::{RecordCache, RecordSource};
pub use resolver::{
    IndexingConfigurationResolver, RootPageResolver, RootlineResolver,
    TableConfigurationResolver, INVALID_ROOT_PAGE_ID,
};
pub use task::ReIndexTask;
pub use worker::{DrainResult, IndexWorker, ItemIndexer, WorkerConfig};

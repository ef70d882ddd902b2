//! Access to the content records behind queue items.
//!
//! The queue never owns content. A [`RecordSource`] answers the narrow
//! questions the engine asks about a record: does it exist, what are its
//! timestamps, which records of a type belong to a site.

use dashmap::DashMap;
use tracing::trace;

use queue_types::{IndexingConfiguration, Record, Site, TableSchema};

use crate::error::EngineError;

/// Read access to content records.
pub trait RecordSource: Send + Sync {
    /// Fetch a record limited to `fields` (plus `pid`), or `None` if absent.
    fn get_record(
        &self,
        item_type: &str,
        item_uid: u64,
        fields: &[String],
    ) -> Result<Option<Record>, EngineError>;

    /// Column layout of a content type.
    fn table_schema(&self, _item_type: &str) -> TableSchema {
        TableSchema::new()
    }

    /// Most recent change time among the content elements of a page.
    fn page_content_changed_time(&self, page_uid: u64) -> Result<Option<i64>, EngineError>;

    /// Most recent change time among the localized variants of a record.
    fn localizations_changed_time(
        &self,
        item_type: &str,
        item_uid: u64,
    ) -> Result<Option<i64>, EngineError>;

    /// Records of a type inside a site's tree, constrained by the
    /// configuration's additional where clause.
    fn find_records(
        &self,
        item_type: &str,
        site: &Site,
        configuration: &IndexingConfiguration,
    ) -> Result<Vec<Record>, EngineError>;

    /// Whether a record satisfies a configuration's additional constraint.
    fn matches_configuration(
        &self,
        _item_type: &str,
        _item_uid: u64,
        _configuration: &IndexingConfiguration,
    ) -> Result<bool, EngineError> {
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    item_type: String,
    item_uid: u64,
    fields: Vec<String>,
}

impl CacheKey {
    fn new(item_type: &str, item_uid: u64, fields: &[String]) -> Self {
        let mut fields = fields.to_vec();
        fields.sort();
        fields.dedup();
        Self {
            item_type: item_type.to_string(),
            item_uid,
            fields,
        }
    }
}

/// Memoized record lookups keyed by (type, uid, field set).
///
/// Only found records are cached, so a record created after a miss is seen
/// on the next lookup. A cache lives as long as one
/// [`UpdateBatch`](crate::UpdateBatch).
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: DashMap<CacheKey, Record>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached record, fetching it from `source` on a miss.
    pub fn get_or_fetch(
        &self,
        source: &dyn RecordSource,
        item_type: &str,
        item_uid: u64,
        fields: &[String],
    ) -> Result<Option<Record>, EngineError> {
        let key = CacheKey::new(item_type, item_uid, fields);
        if let Some(record) = self.entries.get(&key) {
            trace!(item_type, item_uid, "Record cache hit");
            return Ok(Some(record.clone()));
        }

        let record = source.get_record(item_type, item_uid, &key.fields)?;
        if let Some(ref found) = record {
            self.entries.insert(key, found.clone());
        }
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

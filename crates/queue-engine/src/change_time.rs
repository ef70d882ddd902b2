//! Change time calculation.
//!
//! An item counts as changed at the latest of:
//! 1. its own last-modified time
//! 2. its scheduled start time, if its type supports one
//! 3. for pages, the latest change among the page's content elements; a
//!    canonical page uses the content of its source page instead
//! 4. the latest change among its localized variants
//!
//! A start time in the future keeps the item out of indexing batches until
//! that instant.

use std::sync::Arc;

use tracing::debug;

use queue_types::{Record, PAGE_ITEM_TYPE};

use crate::error::EngineError;
use crate::records::RecordSource;

/// Computes the `changed` timestamp of queue items.
pub struct ChangeTimeCalculator {
    records: Arc<dyn RecordSource>,
}

impl ChangeTimeCalculator {
    pub fn new(records: Arc<dyn RecordSource>) -> Self {
        Self { records }
    }

    /// Change time of an item; 0 if no signal is available.
    pub fn item_changed_time(&self, item_type: &str, item_uid: u64) -> Result<i64, EngineError> {
        let schema = self.records.table_schema(item_type);
        let record = self.records.get_record(
            item_type,
            item_uid,
            &schema.change_time_fields(item_type),
        )?;

        let record_changed = record
            .as_ref()
            .and_then(|r| r.get_i64(&schema.tstamp_field))
            .unwrap_or(0);

        let start_time = match (&record, &schema.starttime_field) {
            (Some(r), Some(field)) => r.get_i64(field).unwrap_or(0),
            _ => 0,
        };

        let page_changed = if item_type == PAGE_ITEM_TYPE {
            self.page_changed_time(item_uid, record.as_ref())?
        } else {
            0
        };

        let localizations_changed = self
            .records
            .localizations_changed_time(item_type, item_uid)?
            .unwrap_or(0);

        let changed = record_changed
            .max(start_time)
            .max(page_changed)
            .max(localizations_changed);

        debug!(
            item_type,
            item_uid,
            record_changed,
            start_time,
            page_changed,
            localizations_changed,
            changed,
            "Computed item change time"
        );
        Ok(changed)
    }

    /// Latest content element change of a page, following a canonical
    /// page to its source.
    fn page_changed_time(&self, page_uid: u64, page: Option<&Record>) -> Result<i64, EngineError> {
        let content_page = page
            .and_then(Record::content_from_pid)
            .unwrap_or(page_uid);
        Ok(self
            .records
            .page_content_changed_time(content_page)?
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordSource;
    use queue_types::TableSchema;

    fn calculator(source: &Arc<MemoryRecordSource>) -> ChangeTimeCalculator {
        ChangeTimeCalculator::new(source.clone())
    }

    #[test]
    fn test_record_tstamp() {
        let source = Arc::new(MemoryRecordSource::new());
        source.insert_record(Record::new("tx_news", 42).with_field("tstamp", 1_000), &[7]);

        assert_eq!(calculator(&source).item_changed_time("tx_news", 42).unwrap(), 1_000);
    }

    #[test]
    fn test_future_start_time_wins() {
        let source = Arc::new(MemoryRecordSource::new());
        source.set_schema("tx_news", TableSchema::with_default_starttime());
        source.insert_record(
            Record::new("tx_news", 42)
                .with_field("tstamp", 1_000)
                .with_field("starttime", 5_000),
            &[7],
        );

        assert_eq!(calculator(&source).item_changed_time("tx_news", 42).unwrap(), 5_000);
    }

    #[test]
    fn test_start_time_ignored_without_schema_support() {
        let source = Arc::new(MemoryRecordSource::new());
        source.insert_record(
            Record::new("tx_news", 42)
                .with_field("tstamp", 1_000)
                .with_field("starttime", 5_000),
            &[7],
        );

        assert_eq!(calculator(&source).item_changed_time("tx_news", 42).unwrap(), 1_000);
    }

    #[test]
    fn test_page_content_and_localizations() {
        let source = Arc::new(MemoryRecordSource::new());
        source.insert_record(Record::new("pages", 3).with_field("tstamp", 100), &[1]);
        source.set_page_content_changed(3, 300);
        assert_eq!(calculator(&source).item_changed_time("pages", 3).unwrap(), 300);

        source.set_localizations_changed("pages", 3, 400);
        assert_eq!(calculator(&source).item_changed_time("pages", 3).unwrap(), 400);
    }

    #[test]
    fn test_canonical_page_uses_source_content() {
        let source = Arc::new(MemoryRecordSource::new());
        source.insert_record(
            Record::new("pages", 10)
                .with_field("tstamp", 100)
                .with_field("content_from_pid", 20),
            &[1],
        );
        source.set_page_content_changed(10, 150);
        source.set_page_content_changed(20, 900);

        assert_eq!(calculator(&source).item_changed_time("pages", 10).unwrap(), 900);
    }

    #[test]
    fn test_missing_record_is_zero() {
        let source = Arc::new(MemoryRecordSource::new());
        assert_eq!(calculator(&source).item_changed_time("tx_news", 1).unwrap(), 0);
    }
}

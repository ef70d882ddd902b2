//! In-memory content store.
//!
//! Holds records, their owning sites and derived change times in memory.
//! It implements both [`RecordSource`] and [`RootPageResolver`], which is
//! enough to run the queue without an external content database.
//!
//! Additional where clauses are evaluated as `field=value` comparisons
//! joined by `AND`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use queue_types::{IndexingConfiguration, Record, Site, TableSchema};

use crate::error::EngineError;
use crate::records::RecordSource;
use crate::resolver::{RootPageResolver, INVALID_ROOT_PAGE_ID};

type RecordId = (String, u64);

#[derive(Debug, Default)]
struct Content {
    records: BTreeMap<RecordId, Record>,
    roots: BTreeMap<RecordId, Vec<u64>>,
    page_content: BTreeMap<u64, i64>,
    localizations: BTreeMap<RecordId, i64>,
    schemas: BTreeMap<String, TableSchema>,
}

/// Records kept in memory, keyed by (type, uid).
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    content: RwLock<Content>,
    lookups: AtomicUsize,
}

fn record_id(item_type: &str, item_uid: u64) -> RecordId {
    (item_type.to_string(), item_uid)
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        other => other.to_string(),
    }
}

/// Evaluate a `field=value [AND field=value ...]` clause against a record.
fn matches_clause(record: &Record, clause: Option<&str>) -> Result<bool, EngineError> {
    let Some(clause) = clause.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(true);
    };
    for condition in clause.split(" AND ") {
        let (field, expected) = condition.split_once('=').ok_or_else(|| {
            EngineError::RecordSource(format!("Unsupported where clause: {}", clause))
        })?;
        let expected = expected.trim().trim_matches(|c| c == '\'' || c == '"');
        let actual = record.get(field.trim()).map(value_as_text);
        if actual.as_deref() != Some(expected) {
            return Ok(false);
        }
    }
    Ok(true)
}

impl MemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Content>, EngineError> {
        self.content
            .read()
            .map_err(|e| EngineError::RecordSource(e.to_string()))
    }

    fn write(&self) -> RwLockWriteGuard<'_, Content> {
        self.content.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace a record together with the sites owning it.
    pub fn insert_record(&self, record: Record, roots: &[u64]) {
        let id = record_id(&record.item_type, record.uid);
        let mut content = self.write();
        content.roots.insert(id.clone(), roots.to_vec());
        content.records.insert(id, record);
    }

    pub fn remove_record(&self, item_type: &str, item_uid: u64) {
        let id = record_id(item_type, item_uid);
        let mut content = self.write();
        content.records.remove(&id);
        content.roots.remove(&id);
    }

    /// Set one field of an existing record. Returns false if it is unknown.
    pub fn set_field(
        &self,
        item_type: &str,
        item_uid: u64,
        field: &str,
        value: impl Into<Value>,
    ) -> bool {
        match self.write().records.get_mut(&record_id(item_type, item_uid)) {
            Some(record) => {
                record.fields.insert(field.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    /// Move a record to other sites.
    pub fn set_roots(&self, item_type: &str, item_uid: u64, roots: &[u64]) {
        self.write()
            .roots
            .insert(record_id(item_type, item_uid), roots.to_vec());
    }

    pub fn set_page_content_changed(&self, page_uid: u64, changed: i64) {
        self.write().page_content.insert(page_uid, changed);
    }

    pub fn set_localizations_changed(&self, item_type: &str, item_uid: u64, changed: i64) {
        self.write()
            .localizations
            .insert(record_id(item_type, item_uid), changed);
    }

    pub fn set_schema(&self, item_type: &str, schema: TableSchema) {
        self.write().schemas.insert(item_type.to_string(), schema);
    }

    /// Number of `get_record` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl RecordSource for MemoryRecordSource {
    fn get_record(
        &self,
        item_type: &str,
        item_uid: u64,
        fields: &[String],
    ) -> Result<Option<Record>, EngineError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .read()?
            .records
            .get(&record_id(item_type, item_uid))
            .map(|record| record.project(fields)))
    }

    fn table_schema(&self, item_type: &str) -> TableSchema {
        self.content
            .read()
            .ok()
            .and_then(|content| content.schemas.get(item_type).cloned())
            .unwrap_or_default()
    }

    fn page_content_changed_time(&self, page_uid: u64) -> Result<Option<i64>, EngineError> {
        Ok(self.read()?.page_content.get(&page_uid).copied())
    }

    fn localizations_changed_time(
        &self,
        item_type: &str,
        item_uid: u64,
    ) -> Result<Option<i64>, EngineError> {
        Ok(self
            .read()?
            .localizations
            .get(&record_id(item_type, item_uid))
            .copied())
    }

    fn find_records(
        &self,
        item_type: &str,
        site: &Site,
        configuration: &IndexingConfiguration,
    ) -> Result<Vec<Record>, EngineError> {
        let content = self.read()?;
        let mut found = Vec::new();
        for ((record_type, uid), record) in &content.records {
            if record_type != item_type {
                continue;
            }
            let in_site = content
                .roots
                .get(&record_id(record_type, *uid))
                .is_some_and(|roots| roots.contains(&site.root_page_id));
            let clause = configuration.additional_where_clause.as_deref();
            if in_site && matches_clause(record, clause)? {
                found.push(record.clone());
            }
        }
        Ok(found)
    }

    fn matches_configuration(
        &self,
        item_type: &str,
        item_uid: u64,
        configuration: &IndexingConfiguration,
    ) -> Result<bool, EngineError> {
        match self.read()?.records.get(&record_id(item_type, item_uid)) {
            Some(record) => {
                matches_clause(record, configuration.additional_where_clause.as_deref())
            }
            None => Ok(false),
        }
    }
}

impl RootPageResolver for MemoryRecordSource {
    fn responsible_root_page_ids(
        &self,
        item_type: &str,
        item_uid: u64,
    ) -> Result<Vec<u64>, EngineError> {
        let roots = self
            .read()?
            .roots
            .get(&record_id(item_type, item_uid))
            .cloned()
            .unwrap_or_default();
        if roots.is_empty() {
            return Ok(vec![INVALID_ROOT_PAGE_ID]);
        }
        Ok(roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_record_projects_fields() {
        let source = MemoryRecordSource::new();
        source.insert_record(
            Record::new("tx_news", 1)
                .with_field("pid", 3)
                .with_field("title", "Hello")
                .with_field("tstamp", 10),
            &[1],
        );

        let record = source
            .get_record("tx_news", 1, &["tstamp".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(record.pid(), Some(3));
        assert!(record.get("title").is_none());
        assert_eq!(source.lookup_count(), 1);
    }

    #[test]
    fn test_find_records_by_site_and_clause() {
        let source = MemoryRecordSource::new();
        source.insert_record(Record::new("tx_news", 1).with_field("category", 1), &[1]);
        source.insert_record(Record::new("tx_news", 2).with_field("category", "2"), &[1]);
        source.insert_record(Record::new("tx_news", 3).with_field("category", 1), &[2]);
        source.insert_record(Record::new("pages", 1), &[1]);

        let site = Site::new(1, "Main");
        let all = source
            .find_records("tx_news", &site, &IndexingConfiguration::for_table("tx_news"))
            .unwrap();
        assert_eq!(all.iter().map(|r| r.uid).collect::<Vec<_>>(), vec![1, 2]);

        let breaking = IndexingConfiguration::for_table("tx_news")
            .with_additional_where_clause("category = 1");
        let filtered = source.find_records("tx_news", &site, &breaking).unwrap();
        assert_eq!(filtered.iter().map(|r| r.uid).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_clause_with_conjunction_and_quotes() {
        let record = Record::new("tx_news", 1)
            .with_field("category", 1)
            .with_field("lang", "de");
        assert!(matches_clause(&record, Some("category=1 AND lang='de'")).unwrap());
        assert!(!matches_clause(&record, Some("category=1 AND lang='en'")).unwrap());
        assert!(matches_clause(&record, None).unwrap());
        assert!(matches_clause(&record, Some("category > 1")).is_err());
    }

    #[test]
    fn test_unowned_record_resolves_to_invalid_root() {
        let source = MemoryRecordSource::new();
        source.insert_record(Record::new("tx_news", 1), &[]);
        assert_eq!(
            source.responsible_root_page_ids("tx_news", 1).unwrap(),
            vec![INVALID_ROOT_PAGE_ID]
        );

        source.set_roots("tx_news", 1, &[1, 2]);
        assert_eq!(source.responsible_root_page_ids("tx_news", 1).unwrap(), vec![1, 2]);
    }
}

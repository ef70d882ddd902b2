//! Resolution of owning sites and indexing configurations.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use queue_types::{SiteConfiguration, PAGE_ITEM_TYPE};

use crate::error::EngineError;
use crate::records::RecordSource;

/// Root page id meaning "no owning site".
pub const INVALID_ROOT_PAGE_ID: u64 = 0;

/// Pages walked up before a rootline is considered broken.
const MAX_ROOTLINE_DEPTH: usize = 99;

/// Finds the sites (root pages) whose tree contains an item.
pub trait RootPageResolver: Send + Sync {
    /// Root page ids responsible for an item. May contain
    /// [`INVALID_ROOT_PAGE_ID`], which callers skip.
    fn responsible_root_page_ids(
        &self,
        item_type: &str,
        item_uid: u64,
    ) -> Result<Vec<u64>, EngineError>;
}

/// Picks the indexing configuration that applies to an item in a site.
pub trait IndexingConfigurationResolver: Send + Sync {
    /// Configuration name, or `None` if the site does not index the item.
    fn indexing_configuration_name(
        &self,
        item_type: &str,
        item_uid: u64,
        site: &SiteConfiguration,
    ) -> Result<Option<String>, EngineError>;
}

/// Resolves the root page by walking `pid` links up the page tree.
///
/// Records start at their parent page, pages at themselves. The first page
/// that is a known site root wins.
pub struct RootlineResolver {
    records: Arc<dyn RecordSource>,
    site_roots: BTreeSet<u64>,
}

impl RootlineResolver {
    pub fn new(records: Arc<dyn RecordSource>, site_roots: impl IntoIterator<Item = u64>) -> Self {
        Self {
            records,
            site_roots: site_roots.into_iter().collect(),
        }
    }

    fn parent_of(&self, item_type: &str, item_uid: u64) -> Result<Option<u64>, EngineError> {
        Ok(self
            .records
            .get_record(item_type, item_uid, &[])?
            .and_then(|record| record.pid()))
    }
}

impl RootPageResolver for RootlineResolver {
    fn responsible_root_page_ids(
        &self,
        item_type: &str,
        item_uid: u64,
    ) -> Result<Vec<u64>, EngineError> {
        let mut page = if item_type == PAGE_ITEM_TYPE {
            Some(item_uid)
        } else {
            self.parent_of(item_type, item_uid)?
        };

        let mut depth = 0;
        while let Some(uid) = page.filter(|uid| *uid > 0) {
            if self.site_roots.contains(&uid) {
                return Ok(vec![uid]);
            }
            depth += 1;
            if depth > MAX_ROOTLINE_DEPTH {
                warn!(item_type, item_uid, "Rootline too deep, giving up");
                break;
            }
            page = self.parent_of(PAGE_ITEM_TYPE, uid)?;
        }

        Ok(vec![INVALID_ROOT_PAGE_ID])
    }
}

/// Picks the first enabled configuration (by name) indexing the item's
/// table whose additional constraint the record satisfies.
pub struct TableConfigurationResolver {
    records: Arc<dyn RecordSource>,
}

impl TableConfigurationResolver {
    pub fn new(records: Arc<dyn RecordSource>) -> Self {
        Self { records }
    }
}

impl IndexingConfigurationResolver for TableConfigurationResolver {
    fn indexing_configuration_name(
        &self,
        item_type: &str,
        item_uid: u64,
        site: &SiteConfiguration,
    ) -> Result<Option<String>, EngineError> {
        for name in site.configuration_names_by_table(item_type) {
            let Some(configuration) = site.configuration(&name) else {
                continue;
            };
            if configuration.additional_where_clause.is_none()
                || self
                    .records
                    .matches_configuration(item_type, item_uid, configuration)?
            {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordSource;
    use queue_types::{IndexingConfiguration, Record};

    fn page_tree() -> Arc<MemoryRecordSource> {
        let source = Arc::new(MemoryRecordSource::new());
        source.insert_record(Record::new("pages", 1).with_field("pid", 0), &[1]);
        source.insert_record(Record::new("pages", 2).with_field("pid", 1), &[1]);
        source.insert_record(Record::new("pages", 3).with_field("pid", 2), &[1]);
        source.insert_record(Record::new("pages", 50).with_field("pid", 0), &[]);
        source.insert_record(Record::new("tx_news", 9).with_field("pid", 3), &[1]);
        source
    }

    #[test]
    fn test_rootline_finds_site_root() {
        let resolver = RootlineResolver::new(page_tree(), [1]);
        assert_eq!(resolver.responsible_root_page_ids("pages", 3).unwrap(), vec![1]);
        assert_eq!(resolver.responsible_root_page_ids("pages", 1).unwrap(), vec![1]);
        assert_eq!(resolver.responsible_root_page_ids("tx_news", 9).unwrap(), vec![1]);
    }

    #[test]
    fn test_rootline_outside_any_site_is_invalid() {
        let resolver = RootlineResolver::new(page_tree(), [1]);
        assert_eq!(
            resolver.responsible_root_page_ids("pages", 50).unwrap(),
            vec![INVALID_ROOT_PAGE_ID]
        );
        assert_eq!(
            resolver.responsible_root_page_ids("tx_news", 404).unwrap(),
            vec![INVALID_ROOT_PAGE_ID]
        );
    }

    #[test]
    fn test_rootline_cycle_terminates() {
        let source = Arc::new(MemoryRecordSource::new());
        source.insert_record(Record::new("pages", 5).with_field("pid", 6), &[]);
        source.insert_record(Record::new("pages", 6).with_field("pid", 5), &[]);
        let resolver = RootlineResolver::new(source, [1]);
        assert_eq!(
            resolver.responsible_root_page_ids("pages", 5).unwrap(),
            vec![INVALID_ROOT_PAGE_ID]
        );
    }

    #[test]
    fn test_table_configuration_resolver() {
        let source = Arc::new(MemoryRecordSource::new());
        source.insert_record(Record::new("tx_news", 1).with_field("category", 2), &[1]);
        let resolver = TableConfigurationResolver::new(source);

        let site = SiteConfiguration::new()
            .with_configuration(
                "breaking",
                IndexingConfiguration::for_table("tx_news")
                    .with_additional_where_clause("category=1"),
            )
            .with_configuration("news", IndexingConfiguration::for_table("tx_news"))
            .with_configuration("pages", IndexingConfiguration::default());

        assert_eq!(
            resolver
                .indexing_configuration_name("tx_news", 1, &site)
                .unwrap()
                .as_deref(),
            Some("news")
        );
        assert_eq!(
            resolver
                .indexing_configuration_name("tx_events", 1, &site)
                .unwrap(),
            None
        );
    }
}

//! Sites and their indexing configurations.
//!
//! A site is a tenant rooted at a root page. Each site carries a set of
//! named indexing configurations; a configuration names the content table it
//! indexes and the initializer that bulk-populates the queue for it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::PAGE_ITEM_TYPE;

/// Initializer used for record tables when none is configured.
pub const DEFAULT_RECORD_INITIALIZER: &str = "record";

/// Initializer used for the page table when none is configured.
pub const DEFAULT_PAGE_INITIALIZER: &str = "page";

/// One named indexing configuration of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingConfiguration {
    /// Disabled configurations are skipped by full-site initialization
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Content table; falls back to the configuration name when absent
    #[serde(default)]
    pub table: Option<String>,

    /// Name of the registered initializer to use
    #[serde(default)]
    pub initialization: Option<String>,

    /// Page types (doktype) eligible for indexing; only used for pages
    #[serde(default = "default_allowed_page_types")]
    pub allowed_page_types: Vec<u32>,

    /// Extra record constraint, interpreted by the record source
    #[serde(default)]
    pub additional_where_clause: Option<String>,

    /// Free-form rules handed through to initializers and indexers
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

fn default_allowed_page_types() -> Vec<u32> {
    // standard pages and mount points
    vec![1, 7]
}

impl Default for IndexingConfiguration {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            table: None,
            initialization: None,
            allowed_page_types: default_allowed_page_types(),
            additional_where_clause: None,
            rules: BTreeMap::new(),
        }
    }
}

impl IndexingConfiguration {
    /// Configuration indexing the given table.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Default::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_initialization(mut self, initializer: impl Into<String>) -> Self {
        self.initialization = Some(initializer.into());
        self
    }

    pub fn with_allowed_page_types(mut self, page_types: Vec<u32>) -> Self {
        self.allowed_page_types = page_types;
        self
    }

    pub fn with_additional_where_clause(mut self, clause: impl Into<String>) -> Self {
        self.additional_where_clause = Some(clause.into());
        self
    }

    pub fn with_rule(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.rules.insert(key.into(), value.into());
        self
    }

    pub fn is_allowed_page_type(&self, doktype: u32) -> bool {
        self.allowed_page_types.contains(&doktype)
    }
}

/// The indexing configurations of one site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfiguration {
    #[serde(default)]
    pub index_queue: BTreeMap<String, IndexingConfiguration>,
}

impl SiteConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of a named configuration.
    pub fn with_configuration(
        mut self,
        name: impl Into<String>,
        configuration: IndexingConfiguration,
    ) -> Self {
        self.index_queue.insert(name.into(), configuration);
        self
    }

    pub fn configuration(&self, name: &str) -> Option<&IndexingConfiguration> {
        self.index_queue.get(name)
    }

    /// Names of all enabled configurations, sorted.
    pub fn enabled_configuration_names(&self) -> Vec<String> {
        self.index_queue
            .iter()
            .filter(|(_, configuration)| configuration.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Table indexed by a configuration, falling back to its name.
    pub fn table_name_or_fallback(&self, name: &str) -> String {
        self.configuration(name)
            .and_then(|c| c.table.clone())
            .unwrap_or_else(|| name.to_string())
    }

    /// Initializer registered for a configuration.
    ///
    /// Unless configured explicitly, the page table uses the page initializer
    /// and every other table the record initializer.
    pub fn initializer_name(&self, name: &str) -> String {
        if let Some(initializer) = self.configuration(name).and_then(|c| c.initialization.clone()) {
            return initializer;
        }
        if self.table_name_or_fallback(name) == PAGE_ITEM_TYPE {
            DEFAULT_PAGE_INITIALIZER.to_string()
        } else {
            DEFAULT_RECORD_INITIALIZER.to_string()
        }
    }

    /// Enabled configurations indexing the given table, sorted by name.
    pub fn configuration_names_by_table(&self, table: &str) -> Vec<String> {
        self.index_queue
            .iter()
            .filter(|(name, configuration)| {
                configuration.enabled && self.table_name_or_fallback(name) == table
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether a page type may be queued under the named configuration.
    ///
    /// Unknown configurations fall back to the default allow-list.
    pub fn is_allowed_page_type(&self, name: &str, doktype: u32) -> bool {
        match self.configuration(name) {
            Some(configuration) => configuration.is_allowed_page_type(doktype),
            None => default_allowed_page_types().contains(&doktype),
        }
    }
}

/// A tenant: root page plus its indexing configurations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Root page id, the tenant identifier stored on queue items
    pub root_page_id: u64,

    /// Human readable label
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub configuration: SiteConfiguration,
}

impl Site {
    pub fn new(root_page_id: u64, label: impl Into<String>) -> Self {
        Self {
            root_page_id,
            label: label.into(),
            configuration: SiteConfiguration::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: SiteConfiguration) -> Self {
        self.configuration = configuration;
        self
    }
}

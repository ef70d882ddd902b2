//! Queue item types.
//!
//! A queue item records that a content item must be (re-)submitted to the
//! search engine for one root page. The triple
//! (`item_type`, `item_uid`, `root`) identifies an item; the store keeps at
//! most one entry per triple.

use serde::{Deserialize, Serialize};

/// Item type of hierarchical page content.
pub const PAGE_ITEM_TYPE: &str = "pages";

/// Classification of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// `indexed < changed`, no error recorded
    Pending,
    /// `indexed >= changed`, no error recorded
    Success,
    /// Error recorded, regardless of timestamps
    Failed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Success => write!(f, "success"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A persisted index queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Store-assigned identifier, ascending in insertion order
    pub id: u64,

    /// Kind of content, usually a table name
    pub item_type: String,

    /// Identifier of the content item within its type
    pub item_uid: u64,

    /// Root page (site) the item is queued for
    pub root: u64,

    /// Name of the indexing configuration to apply
    pub indexing_configuration: String,

    /// Unix seconds of the last material change, or a future publish time
    pub changed: i64,

    /// Unix seconds of the last successful indexing run, 0 if never indexed
    #[serde(default)]
    pub indexed: i64,

    /// Error message of the last failed indexing run, empty if none
    #[serde(default)]
    pub errors: String,

    /// Opaque payload for the indexing pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_parameters: Option<String>,
}

impl QueueItem {
    /// Create a never-indexed item without errors.
    pub fn new(
        id: u64,
        item_type: impl Into<String>,
        item_uid: u64,
        root: u64,
        indexing_configuration: impl Into<String>,
        changed: i64,
    ) -> Self {
        Self {
            id,
            item_type: item_type.into(),
            item_uid,
            root,
            indexing_configuration: indexing_configuration.into(),
            changed,
            indexed: 0,
            errors: String::new(),
            serialized_parameters: None,
        }
    }

    /// Whether an error message is recorded for this item.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the item has changed since it was last indexed.
    pub fn is_pending(&self) -> bool {
        self.indexed < self.changed
    }

    /// Whether the item was indexed at least once.
    pub fn is_indexed(&self) -> bool {
        self.indexed > 0
    }

    /// Whether the item should be handed to the indexer at `now`.
    ///
    /// Failed items and items scheduled for a future publish time are not due.
    pub fn is_due(&self, now: i64) -> bool {
        !self.has_errors() && self.is_pending() && self.changed <= now
    }

    /// Classify the item. Failure takes precedence over pending/success.
    pub fn status(&self) -> ItemStatus {
        if self.has_errors() {
            ItemStatus::Failed
        } else if self.is_pending() {
            ItemStatus::Pending
        } else {
            ItemStatus::Success
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// An item about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueueItem {
    pub item_type: String,
    pub item_uid: u64,
    pub root: u64,
    pub indexing_configuration: String,
    pub changed: i64,
    pub serialized_parameters: Option<String>,
}

impl NewQueueItem {
    pub fn new(
        item_type: impl Into<String>,
        item_uid: u64,
        root: u64,
        indexing_configuration: impl Into<String>,
        changed: i64,
    ) -> Self {
        Self {
            item_type: item_type.into(),
            item_uid,
            root,
            indexing_configuration: indexing_configuration.into(),
            changed,
            serialized_parameters: None,
        }
    }

    /// Attach an opaque payload for the indexing pipeline.
    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.serialized_parameters = Some(parameters.into());
        self
    }

    /// Materialize the persisted item under the given id.
    pub fn into_item(self, id: u64) -> QueueItem {
        QueueItem {
            id,
            item_type: self.item_type,
            item_uid: self.item_uid,
            root: self.root,
            indexing_configuration: self.indexing_configuration,
            changed: self.changed,
            indexed: 0,
            errors: String::new(),
            serialized_parameters: self.serialized_parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(changed: i64, indexed: i64, errors: &str) -> QueueItem {
        let mut item = QueueItem::new(1, "tx_news", 42, 7, "news", changed);
        item.indexed = indexed;
        item.errors = errors.to_string();
        item
    }

    #[test]
    fn test_new_item_is_pending() {
        let item = item(1_000, 0, "");
        assert!(item.is_pending());
        assert!(!item.is_indexed());
        assert_eq!(item.status(), ItemStatus::Pending);
    }

    #[test]
    fn test_indexed_after_change_is_success() {
        assert_eq!(item(1_000, 1_000, "").status(), ItemStatus::Success);
        assert_eq!(item(1_000, 2_000, "").status(), ItemStatus::Success);
    }

    #[test]
    fn test_failure_takes_precedence() {
        assert_eq!(item(1_000, 0, "boom").status(), ItemStatus::Failed);
        assert_eq!(item(1_000, 5_000, "boom").status(), ItemStatus::Failed);
    }

    #[test]
    fn test_is_due() {
        assert!(item(1_000, 0, "").is_due(1_000));
        assert!(!item(1_000, 0, "").is_due(999));
        assert!(!item(1_000, 0, "timeout").is_due(2_000));
        assert!(!item(1_000, 1_500, "").is_due(2_000));
    }

    #[test]
    fn test_new_queue_item_into_item() {
        let item = NewQueueItem::new("pages", 3, 1, "pages", 500)
            .with_parameters(r#"{"mount_page_source":12}"#)
            .into_item(9);
        assert_eq!(item.id, 9);
        assert_eq!(item.indexed, 0);
        assert!(item.errors.is_empty());
        assert_eq!(
            item.serialized_parameters.as_deref(),
            Some(r#"{"mount_page_source":12}"#)
        );
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let json = r#"{"id":1,"item_type":"pages","item_uid":2,"root":1,
            "indexing_configuration":"pages","changed":10}"#;
        let item = QueueItem::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(item.indexed, 0);
        assert!(item.errors.is_empty());
        assert!(item.serialized_parameters.is_none());
    }
}

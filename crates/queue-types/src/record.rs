//! Content records as seen by the queue.
//!
//! The queue never owns content. It reads a narrow projection of the
//! underlying row (parent page, page type, timestamps) to decide whether an
//! item is eligible and when it last changed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known field names.
pub mod fields {
    /// Parent page of a record
    pub const PID: &str = "pid";
    /// Record identifier
    pub const UID: &str = "uid";
    /// Page type of a page record
    pub const DOKTYPE: &str = "doktype";
    /// Source page a canonical page takes its content from
    pub const CONTENT_FROM_PID: &str = "content_from_pid";
    /// Default last-modified column
    pub const TSTAMP: &str = "tstamp";
    /// Default scheduled-publish column
    pub const STARTTIME: &str = "starttime";
}

/// Column layout of a content type relevant to change-time calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Column holding the last-modified timestamp
    pub tstamp_field: String,

    /// Column holding the scheduled publish time, if the type supports it
    #[serde(default)]
    pub starttime_field: Option<String>,
}

impl TableSchema {
    /// Schema with the default `tstamp` column and no start time support.
    pub fn new() -> Self {
        Self {
            tstamp_field: fields::TSTAMP.to_string(),
            starttime_field: None,
        }
    }

    /// Schema with the default `tstamp` and `starttime` columns.
    pub fn with_default_starttime() -> Self {
        Self::new().with_starttime(fields::STARTTIME)
    }

    pub fn with_tstamp(mut self, field: impl Into<String>) -> Self {
        self.tstamp_field = field.into();
        self
    }

    pub fn with_starttime(mut self, field: impl Into<String>) -> Self {
        self.starttime_field = Some(field.into());
        self
    }

    /// Columns needed to compute an item's change time.
    pub fn change_time_fields(&self, item_type: &str) -> Vec<String> {
        let mut columns = vec![self.tstamp_field.clone()];
        if let Some(ref starttime) = self.starttime_field {
            columns.push(starttime.clone());
        }
        if item_type == crate::PAGE_ITEM_TYPE {
            columns.push(fields::CONTENT_FROM_PID.to_string());
        }
        columns
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// A content row with a loosely typed field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Content type, usually a table name
    pub item_type: String,

    /// Record identifier within its type
    pub uid: u64,

    /// Field values keyed by column name
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(item_type: impl Into<String>, uid: u64) -> Self {
        Self {
            item_type: item_type.into(),
            uid,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read a field as a signed integer.
    ///
    /// Numeric strings are accepted since many content stores hand out
    /// integer columns as text.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.fields.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Read a field as an unsigned integer; negative values yield `None`.
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get_i64(name).and_then(|v| u64::try_from(v).ok())
    }

    pub fn pid(&self) -> Option<u64> {
        self.get_u64(fields::PID)
    }

    /// Page type, present on page records.
    pub fn doktype(&self) -> Option<u32> {
        self.get_i64(fields::DOKTYPE)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Source page of a canonical page. Zero means "no source".
    pub fn content_from_pid(&self) -> Option<u64> {
        self.get_u64(fields::CONTENT_FROM_PID).filter(|pid| *pid > 0)
    }

    /// Copy of this record limited to the requested fields.
    ///
    /// `pid` is always kept, mirroring how content stores answer narrow
    /// record lookups.
    pub fn project(&self, requested: &[String]) -> Record {
        let kept = self
            .fields
            .iter()
            .filter(|(name, _)| {
                name.as_str() == fields::PID || requested.iter().any(|r| r == *name)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Record {
            item_type: self.item_type.clone(),
            uid: self.uid,
            fields: kept,
        }
    }
}

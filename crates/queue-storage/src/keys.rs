//! Key encoding and decoding for storage layer.
//!
//! All numeric key parts are zero-padded to 20 digits so that lexicographic
//! byte order matches numeric order:
//! - `item:{id:020}` in the items column family
//! - `{item_type}:{item_uid:020}:{root:020}` in the triple index
//! - `{root:020}:{id:020}` in the root index and the error index
//! - `{root:020}:{changed:020}:{id:020}` in the pending index, with the
//!   signed change time shifted into unsigned range
//!
//! Item types must not contain `:`; the triple index relies on it as the
//! separator for prefix scans by type and by (type, uid).

use crate::error::StorageError;

const SEPARATOR: char = ':';

/// Reject item types that would break triple key prefix scans.
pub fn validate_item_type(item_type: &str) -> Result<(), StorageError> {
    if item_type.is_empty() {
        return Err(StorageError::Key("item type must not be empty".to_string()));
    }
    if item_type.contains(SEPARATOR) {
        return Err(StorageError::Key(format!(
            "item type must not contain '{}': {}",
            SEPARATOR, item_type
        )));
    }
    Ok(())
}

fn parse_u64(part: &str, what: &str) -> Result<u64, StorageError> {
    part.parse()
        .map_err(|e| StorageError::Key(format!("Invalid {}: {}", what, e)))
}

fn utf8(bytes: &[u8]) -> Result<&str, StorageError> {
    std::str::from_utf8(bytes).map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))
}

/// Key for queue items
/// Format: item:{id:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemKey {
    pub id: u64,
}

impl ItemKey {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("item:{:020}", self.id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let id = s
            .strip_prefix("item:")
            .ok_or_else(|| StorageError::Key(format!("Invalid item key format: {}", s)))?;
        Ok(Self {
            id: parse_u64(id, "item id")?,
        })
    }
}

/// Unique index entry for a (type, uid, root) triple
/// Format: {item_type}:{item_uid:020}:{root:020}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleKey {
    pub item_type: String,
    pub item_uid: u64,
    pub root: u64,
}

impl TripleKey {
    pub fn new(item_type: impl Into<String>, item_uid: u64, root: u64) -> Self {
        Self {
            item_type: item_type.into(),
            item_uid,
            root,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}:{:020}:{:020}", self.item_type, self.item_uid, self.root).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(StorageError::Key(format!("Invalid triple key format: {}", s)));
        }
        Ok(Self {
            item_type: parts[0].to_string(),
            item_uid: parse_u64(parts[1], "item uid")?,
            root: parse_u64(parts[2], "root")?,
        })
    }

    /// Prefix matching every root of one content item
    pub fn prefix_for_item(item_type: &str, item_uid: u64) -> Vec<u8> {
        format!("{}:{:020}:", item_type, item_uid).into_bytes()
    }

    /// Prefix matching every item of one type
    pub fn prefix_for_type(item_type: &str) -> Vec<u8> {
        format!("{}:", item_type).into_bytes()
    }
}

/// Root index entry
/// Format: {root:020}:{id:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootKey {
    pub root: u64,
    pub id: u64,
}

impl RootKey {
    pub fn new(root: u64, id: u64) -> Self {
        Self { root, id }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{:020}:{:020}", self.root, self.id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let (root, id) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| StorageError::Key(format!("Invalid root key format: {}", s)))?;
        Ok(Self {
            root: parse_u64(root, "root")?,
            id: parse_u64(id, "item id")?,
        })
    }

    /// Prefix matching every item of one root
    pub fn prefix(root: u64) -> Vec<u8> {
        format!("{:020}:", root).into_bytes()
    }
}

/// Pending index entry, ordered by change time then id within a root
/// Format: {root:020}:{changed + 2^63:020}:{id:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueKey {
    pub root: u64,
    pub changed: i64,
    pub id: u64,
}

const TIME_OFFSET: u64 = 1 << 63;

impl DueKey {
    pub fn new(root: u64, changed: i64, id: u64) -> Self {
        Self { root, changed, id }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let changed = (self.changed as u64) ^ TIME_OFFSET;
        format!("{:020}:{:020}:{:020}", self.root, changed, self.id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(StorageError::Key(format!("Invalid due key format: {}", s)));
        }
        let changed = parse_u64(parts[1], "change time")? ^ TIME_OFFSET;
        Ok(Self {
            root: parse_u64(parts[0], "root")?,
            changed: changed as i64,
            id: parse_u64(parts[2], "item id")?,
        })
    }

    /// Prefix matching every pending item of one root
    pub fn prefix(root: u64) -> Vec<u8> {
        RootKey::prefix(root)
    }
}

/// Encode an item id as the value of a triple index entry.
pub fn encode_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decode an item id stored in a triple index entry.
pub fn decode_id(bytes: &[u8]) -> Result<u64, StorageError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Key(format!("Invalid id length: {}", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

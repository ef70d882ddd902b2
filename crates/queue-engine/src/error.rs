//! Error types for the queue engine.

use queue_storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the queue engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A configuration names an initializer that is not registered
    #[error("Unknown initializer '{initializer}' for configuration '{configuration}'")]
    UnknownInitializer {
        initializer: String,
        configuration: String,
    },

    /// A site has no indexing configuration of this name
    #[error("Unknown indexing configuration '{configuration}' for root {root}")]
    UnknownConfiguration { configuration: String, root: u64 },

    /// A post-initialization observer failed
    #[error("Observer error: {0}")]
    Observer(String),

    /// The content record source failed
    #[error("Record source error: {0}")]
    RecordSource(String),

    /// The downstream indexer failed on an item
    #[error("Indexer error: {0}")]
    Indexer(String),

    /// A task cannot run with its current settings
    #[error("Task error: {0}")]
    Task(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::UnknownInitializer {
            initializer: "calendar".to_string(),
            configuration: "events".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown initializer 'calendar' for configuration 'events'"
        );

        let err = EngineError::Indexer("connection refused".to_string());
        assert_eq!(err.to_string(), "Indexer error: connection refused");
    }

    #[test]
    fn test_from_storage_error() {
        let err: EngineError = StorageError::NotFound("item 1".to_string()).into();
        assert!(matches!(err, EngineError::Storage(_)));
    }
}

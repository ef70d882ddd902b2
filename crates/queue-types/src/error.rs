//! Error types for the index queue.

use thiserror::Error;

/// Unified error type for queue domain operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_errors_convert() {
        let err: QueueError = serde_json::from_str::<u64>("not json").unwrap_err().into();
        assert!(matches!(err, QueueError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error:"));
    }

    #[test]
    fn test_config_error_message() {
        let err = QueueError::Config("batch_size must be > 0".to_string());
        assert_eq!(err.to_string(), "Configuration error: batch_size must be > 0");
    }
}

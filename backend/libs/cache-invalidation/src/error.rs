//! Error types for revalidation publishing and subscription

use thiserror::Error;

/// Revalidation errors
#[derive(Error, Debug)]
pub enum InvalidationError {
    /// Redis connection or operation error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Message serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache key or message did not have the expected shape
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Subscriber callback returned an error
    #[error("Callback execution failed: {0}")]
    CallbackFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InvalidationError::InvalidMessage("strand:".to_string());
        assert_eq!(err.to_string(), "Invalid message format: strand:");

        let err = InvalidationError::CallbackFailed("page cache offline".to_string());
        assert_eq!(
            err.to_string(),
            "Callback execution failed: page cache offline"
        );
    }

    #[test]
    fn test_error_from_serde() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: InvalidationError = json_err.into();
        assert!(matches!(err, InvalidationError::Serialization(_)));
    }
}

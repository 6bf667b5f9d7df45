//! Error types shared by the offline sync crates.

use thiserror::Error;

/// Errors raised while interpreting data model values.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Unknown mutation kind tag
    #[error("invalid operation kind: {0}")]
    InvalidOperation(String),

    /// Unknown resolution strategy tag
    #[error("invalid resolution strategy: {0}")]
    InvalidStrategy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::InvalidOperation("UPSERT".into());
        assert_eq!(err.to_string(), "invalid operation kind: UPSERT");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}

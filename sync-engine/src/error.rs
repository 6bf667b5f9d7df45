//! Error types for sync-engine.

use std::path::PathBuf;

/// Main error type for sync-engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote server error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload (de)serialization failed.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded.
    #[error("corrupt row in {table} ({id}): {reason}")]
    CorruptRow {
        /// Table the row belongs to.
        table: &'static str,
        /// Row id.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Errors talking to the remote CRUD server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The server could not be reached. Operations stay queued.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered but refused the request.
    #[error("request rejected: {reason}")]
    Rejected {
        /// Reason given by the server.
        reason: String,
    },
}

impl RemoteError {
    /// Whether the failure is a connectivity problem.
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for remote operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_converts_into_engine_error() {
        let err: EngineError = StorageError::Migration("boom".into()).into();
        assert_eq!(err.to_string(), "storage error: migration error: boom");
    }

    #[test]
    fn network_errors_are_flagged() {
        assert!(RemoteError::Network("offline".into()).is_network());
        assert!(!RemoteError::Rejected {
            reason: "invalid".into()
        }
        .is_network());
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineError>();
        assert_send_sync::<StorageError>();
    }
}

//! Error types for the synchronization subsystem.

use thiserror::Error;

/// Synchronization subsystem error type.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A message could not be accepted into a transcript.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    /// The requested conversation is not known to this actor.
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
    /// A write would exceed the store quota.
    #[error("store quota exceeded writing {key} ({bytes} bytes, quota {quota})")]
    QuotaExceeded {
        /// Key being written.
        key: String,
        /// Total bytes the store would hold after the write.
        bytes: usize,
        /// Configured quota in bytes.
        quota: usize,
    },
    /// The backing store cannot be reached.
    #[error("store unavailable: {0}")]
    StorageUnavailable(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Invalid built-in pattern.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl SyncError {
    /// Whether the failure came from the store itself (as opposed to bad input).
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. }
                | Self::StorageUnavailable(_)
                | Self::Sqlite(_)
                | Self::TokioSqlite(_)
                | Self::Serialization(_)
        )
    }
}

/// Convenience result alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

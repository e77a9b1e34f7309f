//! Shared key-value store contract.

use std::future::Future;
use std::pin::Pin;

use crate::sync::core::errors::SyncResult;

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// String key-value store visible to both actors.
///
/// Last write wins per key. There is no multi-key transaction and no change
/// notification, so readers poll and must tolerate observing related keys at
/// different points in time.
pub trait SharedStore: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn read(&self, key: &str) -> StoreFuture<'_, SyncResult<Option<String>>>;
    /// Replace the value stored under `key`.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the quota is exceeded.
    fn write(&self, key: &str, value: String) -> StoreFuture<'_, SyncResult<()>>;
    /// List keys starting with `prefix`, sorted.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn keys_with_prefix(&self, prefix: &str) -> StoreFuture<'_, SyncResult<Vec<String>>>;
}

//! In-process shared store backed by a concurrent map.

use dashmap::DashMap;

use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::store::shared_store::{SharedStore, StoreFuture};

/// Thread-safe in-memory store with an optional byte quota.
///
/// The quota counts key and value bytes, like browser local storage does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes beyond `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key() != key)
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }

    fn check_quota(&self, key: &str, value: &str) -> SyncResult<()> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };

        let bytes = self.used_bytes_without(key) + key.len() + value.len();
        if bytes > quota {
            return Err(SyncError::QuotaExceeded {
                key: key.to_string(),
                bytes,
                quota,
            });
        }
        Ok(())
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, key: &str) -> StoreFuture<'_, SyncResult<Option<String>>> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn write(&self, key: &str, value: String) -> StoreFuture<'_, SyncResult<()>> {
        let result = self.check_quota(key, &value).map(|()| {
            self.entries.insert(key.to_string(), value);
        });
        Box::pin(async move { result })
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreFuture<'_, SyncResult<Vec<String>>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Box::pin(async move { Ok(keys) })
    }
}

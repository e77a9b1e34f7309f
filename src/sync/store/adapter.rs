//! Typed access to the shared store.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::sync::core::clock::Clock;
use crate::sync::core::control::ControlRecord;
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::VisitorSessionId;
use crate::sync::store::keys;
use crate::sync::store::record::{ConversationRecord, ConversationSummary, parse_record};
use crate::sync::store::shared_store::SharedStore;

/// JSON layer over a [`SharedStore`].
///
/// Serialization failures are returned to the caller like any other store
/// failure; nothing is dropped silently.
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn SharedStore>,
}

impl StoreAdapter {
    /// Wrap a store implementation.
    #[must_use]
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Read and decode the value under `key`.
    ///
    /// # Errors
    /// Returns an error if storage access or decoding fails.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        match self.store.read(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and write `value` under `key`.
    ///
    /// # Errors
    /// Returns an error if encoding or storage access fails.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> SyncResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.write(key, raw).await
    }

    /// List keys starting with `prefix`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn keys_with_prefix(&self, prefix: &str) -> SyncResult<Vec<String>> {
        self.store.keys_with_prefix(prefix).await
    }

    /// Read a conversation record, normalizing legacy message shapes.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the payload is not a record.
    pub async fn read_record(&self, key: &str) -> SyncResult<Option<ConversationRecord>> {
        match self.store.read(key).await? {
            Some(raw) => Ok(Some(parse_record(&raw)?)),
            None => Ok(None),
        }
    }

    /// Write a conversation record.
    ///
    /// # Errors
    /// Returns an error if encoding or storage access fails.
    pub async fn write_record(&self, key: &str, record: &ConversationRecord) -> SyncResult<()> {
        self.write_json(key, record).await
    }

    /// Control flag of a conversation, failing open to AI control.
    ///
    /// A missing, unreadable or undecodable control record never leaves the
    /// visitor waiting on an operator that does not exist.
    pub async fn read_control(&self, session_id: &VisitorSessionId) -> ControlRecord {
        match self.read_json::<ControlRecord>(&keys::control(session_id)).await {
            Ok(Some(record)) => record,
            Ok(None) => ControlRecord::default(),
            Err(err) => {
                warn!(%session_id, %err, "Control read failed, defaulting to AI control");
                ControlRecord::default()
            }
        }
    }

    /// Write the control flag of a conversation.
    ///
    /// # Errors
    /// Returns an error if encoding or storage access fails.
    pub async fn write_control(
        &self,
        session_id: &VisitorSessionId,
        record: &ControlRecord,
    ) -> SyncResult<()> {
        self.write_json(&keys::control(session_id), record).await
    }

    /// CRM conversation list, empty when absent.
    ///
    /// # Errors
    /// Returns an error if storage access or decoding fails.
    pub async fn read_summaries(&self) -> SyncResult<Vec<ConversationSummary>> {
        Ok(self
            .read_json(keys::CRM_SUMMARIES_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Replace the CRM conversation list.
    ///
    /// # Errors
    /// Returns an error if encoding or storage access fails.
    pub async fn write_summaries(&self, summaries: &[ConversationSummary]) -> SyncResult<()> {
        self.write_json(keys::CRM_SUMMARIES_KEY, summaries).await
    }

    /// Visitor session id of this store, generated and persisted on first use.
    ///
    /// # Errors
    /// Returns an error if storage access fails. A stored id that no longer
    /// validates is replaced.
    pub async fn load_or_create_session(&self, clock: &dyn Clock) -> SyncResult<VisitorSessionId> {
        match self.read_json::<VisitorSessionId>(keys::VISITOR_SESSION_KEY).await {
            Ok(Some(session_id)) => {
                debug!(%session_id, "Reusing visitor session");
                return Ok(session_id);
            }
            Ok(None) => {}
            Err(SyncError::Serialization(err)) => {
                warn!(%err, "Stored visitor session is invalid, generating a new one");
            }
            Err(err) => return Err(err),
        }

        let session_id = VisitorSessionId::generate(clock.now());
        self.write_json(keys::VISITOR_SESSION_KEY, &session_id).await?;
        info!(%session_id, "Created visitor session");
        Ok(session_id)
    }
}

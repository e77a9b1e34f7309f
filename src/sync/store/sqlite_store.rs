//! `SQLite`-backed shared store.

use chrono::Utc;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::sync::core::config::StorageConfig;
use crate::sync::core::errors::SyncResult;
use crate::sync::store::shared_store::{SharedStore, StoreFuture};

/// Durable key-value store in a single `SQLite` table.
pub struct SqliteStore {
    conn: Connection,
    table: String,
}

impl SqliteStore {
    /// Open (or create) the store described by `config`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(config: &StorageConfig) -> SyncResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        Self::init(conn, config.table.clone()).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be created.
    pub async fn in_memory(table: impl Into<String>) -> SyncResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, table.into()).await
    }

    async fn init(conn: Connection, table: String) -> SyncResult<Self> {
        let table_name = table.clone();
        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }
}

impl SharedStore for SqliteStore {
    fn read(&self, key: &str) -> StoreFuture<'_, SyncResult<Option<String>>> {
        let key = key.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            let value = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!("SELECT value FROM {table} WHERE key = ?1"),
                            rusqlite::params![key],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;
            Ok(value)
        })
    }

    fn write(&self, key: &str, value: String) -> StoreFuture<'_, SyncResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            let updated_at = Utc::now().timestamp_millis();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT OR REPLACE INTO {table} (key, value, updated_at)
                             VALUES (?1, ?2, ?3)"
                        ),
                        rusqlite::params![key, value, updated_at],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreFuture<'_, SyncResult<Vec<String>>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            let keys = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT key FROM {table}
                         WHERE substr(key, 1, length(?1)) = ?1
                         ORDER BY key"
                    ))?;
                    let keys = stmt
                        .query_map(rusqlite::params![prefix], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(keys)
                })
                .await?;
            Ok(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let store = SqliteStore::in_memory("kv").await.unwrap();
        assert_eq!(store.read("missing").await.unwrap(), None);
        store.write("a", "1".to_string()).await.unwrap();
        store.write("a", "2".to_string()).await.unwrap();
        assert_eq!(store.read("a").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_prefix_is_literal() {
        let store = SqliteStore::in_memory("kv").await.unwrap();
        for key in ["chat_session_b", "chatXsessionXc", "chat_session_a", "crm_conversations"] {
            store.write(key, "{}".to_string()).await.unwrap();
        }
        let keys = store.keys_with_prefix("chat_session_").await.unwrap();
        assert_eq!(keys, vec!["chat_session_a", "chat_session_b"]);
    }
}

// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Key/value stores backing the local backend
//!
//! A store holds opaque string values under string keys. The local backend
//! decides what the keys mean and serializes collections itself.
//!
//! Implementations:
//! - [`MemoryStore`] - process-local map, used by tests
//! - [`SqliteStore`] - embedded file-backed store, one row per key

use crate::error::Result;
use crate::storage::database::Database;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;

/// Collection-level string storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `None` if absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys, in ascending order
    async fn keys(&self) -> Result<Vec<String>>;

    /// Keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (or create) the store file
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Database::new(path).await?))
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::new_in_memory().await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(&value)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM kv_entries ORDER BY key")
            .fetch_all(self.db.pool())
            .await?;

        Ok(keys)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        // substr() avoids LIKE wildcards in user-controlled prefixes
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT key FROM kv_entries WHERE substr(key, 1, length(?)) = ? ORDER BY key",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(self.db.pool())
        .await?;

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise_store(store: &dyn KeyValueStore) {
        assert_eq!(store.get("allBooks").await.unwrap(), None);

        store.set("allBooks", "[]".to_string()).await.unwrap();
        store.set("notes_1", "[1]".to_string()).await.unwrap();
        store.set("notes_2", "[2]".to_string()).await.unwrap();
        store.set("notes_1", "[1,1]".to_string()).await.unwrap();

        assert_eq!(store.get("notes_1").await.unwrap().as_deref(), Some("[1,1]"));
        assert_eq!(
            store.keys_with_prefix("notes_").await.unwrap(),
            vec!["notes_1".to_string(), "notes_2".to_string()]
        );

        store.remove("notes_2").await.unwrap();
        store.remove("missing").await.unwrap();
        assert_eq!(
            store.keys().await.unwrap(),
            vec!["allBooks".to_string(), "notes_1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise_store(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_sqlite_prefix_is_literal() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.set("notes_1", "[]".to_string()).await.unwrap();
        store.set("notesX1", "[]".to_string()).await.unwrap();

        assert_eq!(
            store.keys_with_prefix("notes_").await.unwrap(),
            vec!["notes_1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paradise.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.set("users", "[]".to_string()).await.unwrap();
            store.database().clone().close().await.unwrap();
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.get("users").await.unwrap().as_deref(), Some("[]"));
    }
}

//! Durable key-value storage for the conversation and mood slots
//!
//! Values are opaque strings. The SQLite backend keeps them in a single
//! `kv` table; the memory backend is for tests and throwaway sessions.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn backend_name(&self) -> &str;
}

/// SQLite-backed storage
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database at the given path
    pub async fn new(db_path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database, gone when the pool closes
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}

/// Non-persistent storage
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().await.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(storage: &dyn Storage) {
        assert_eq!(storage.get("calm_mood").await.unwrap(), None);

        storage.set("calm_mood", "sad").await.unwrap();
        assert_eq!(storage.get("calm_mood").await.unwrap().as_deref(), Some("sad"));

        storage.set("calm_mood", "happy").await.unwrap();
        assert_eq!(storage.get("calm_mood").await.unwrap().as_deref(), Some("happy"));

        storage.remove("calm_mood").await.unwrap();
        assert_eq!(storage.get("calm_mood").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        exercise(&storage).await;
        assert_eq!(storage.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        exercise(&storage).await;
        assert_eq!(storage.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("calm-ai-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("calm.db");

        {
            let storage = SqliteStorage::new(&path).await.unwrap();
            storage.set("calm_messages", "[]").await.unwrap();
            storage.pool.close().await;
        }

        let reopened = SqliteStorage::new(&path).await.unwrap();
        assert_eq!(
            reopened.get("calm_messages").await.unwrap().as_deref(),
            Some("[]")
        );

        reopened.pool.close().await;
        let _ = std::fs::remove_dir_all(dir);
    }
}

//! Document blobs: a keyed byte store backed by PostgreSQL or memory.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{PgPool, Row};

/// Storage for whole serialized documents under string keys.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Fetch the blob stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, sqlx::Error>;

    /// Store `data` under `key`, replacing any previous blob.
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), sqlx::Error>;

    /// Remove the blob under `key`, if any.
    async fn delete(&self, key: &str) -> Result<(), sqlx::Error>;
}

/// Byte store backed by the `documents` table.
#[derive(Clone)]
pub struct PgByteStore {
    pool: PgPool,
}

impl PgByteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ByteStore for PgByteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, sqlx::Error> {
        let row = sqlx::query("SELECT data FROM documents WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get::<Vec<u8>, _>("data")).transpose()
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO documents (key, data, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM documents WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Process-local byte store, used when no database is configured.
#[derive(Default)]
pub struct MemoryByteStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ByteStore for MemoryByteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, sqlx::Error> {
        Ok(self.blobs.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), sqlx::Error> {
        self.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), sqlx::Error> {
        self.blobs.remove(key);
        Ok(())
    }
}

//! SQLite-backed record store
//!
//! One `records` table holds every key. Expiry is stored as Unix milliseconds
//! and compared on every read, so an expired row is indistinguishable from a
//! missing one. Conditional writes are single statements, which SQLite
//! executes atomically even with several pooled connections.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

use super::RecordStore;
use crate::Result;

/// SQLite-backed [`RecordStore`]
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_add(ttl_ms)
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // mode=rwc: read, write, create
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        tracing::debug!("Connecting to record store: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Self::with_pool(pool).await
    }

    /// Wrap an existing pool, creating the records table if missing
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Delete every expired row, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM records WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM records WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_millis())
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_millis())
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn set_if_not_exists(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        // An expired row is taken over in place; a live row blocks the write.
        let now = now_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO records (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            WHERE records.expires_at <= ?
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_if_value(&self, key: &str, expected: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM records WHERE key = ? AND value = ? AND expires_at > ?")
                .bind(key)
                .bind(expected)
                .bind(now_millis())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }
}
